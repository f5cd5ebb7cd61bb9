// Strictly-typed discovery domain model.
//
// Everything here is produced by the normalization boundary; the loose wire
// shapes never leak past crate::normalize.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::normalize::scalar_to_string;

/// A report template reference, as the discovery caller knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl TemplateRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: None,
        }
    }
}

/// Inclusive date bounds of a discovery query. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Both bounds present - the range can drive a recurring schedule.
    pub fn is_bounded(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// Shared context of the last discovery run, persisted once per envelope
/// rather than per template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryMeta {
    pub date_range: DateRange,
    pub templates: Vec<TemplateRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_name: Option<String>,
    /// Epoch milliseconds of the fetch that produced the cached results.
    pub fetched_at: i64,
}

/// One discovered batch after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Stable identifier, always compared in string form.
    pub id: String,
    pub rows: i64,
    pub parent: i64,
    /// Derived as rows / max(parent, 1); never trusted from the server.
    pub rows_per_parent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<JsonValue>,
    pub selected: bool,
}

/// A field usable as a discovery dimension or metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Server-declared schema metadata for discovery results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscoverySchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<SchemaDefaults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<FieldDescriptor>>,
}

/// Server-declared default chart axes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

/// The dimension/metric pair a results chart opens with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartDefaults {
    pub dimension: String,
    pub metric: String,
}

/// Per-batch chart metrics row. Either passed through from the server or
/// synthesized from the normalized batch list; the field names are identical
/// in both cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetric {
    pub batch_index: usize,
    pub batch_id: String,
    pub rows: i64,
    pub parent: i64,
    pub rows_per_parent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<JsonValue>,
}

/// Active resample view configuration: which axes the chart shows and how
/// many batches a resample draws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleConfig {
    pub dimension: String,
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u32>,
}

impl ResampleConfig {
    /// Shallow merge: fields present in the patch win, everything else is
    /// retained.
    pub fn apply(&mut self, patch: ResampleConfigPatch) {
        if let Some(dimension) = patch.dimension {
            self.dimension = dimension;
        }
        if let Some(metric) = patch.metric {
            self.metric = metric;
        }
        if let Some(sample_size) = patch.sample_size {
            self.sample_size = Some(sample_size);
        }
    }
}

/// Partial [`ResampleConfig`] update; absent fields leave the current value
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResampleConfigPatch {
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub sample_size: Option<u32>,
}

/// Resample view state: the config plus the visible-id filter.
/// `filtered_ids = None` means no filter is active and every batch is shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleState {
    pub config: ResampleConfig,
    #[serde(default)]
    pub filtered_ids: Option<BTreeSet<String>>,
}

/// UI-originated resample payload: a new visible subset and/or a config
/// patch. Ids arrive loose and are coerced to strings on application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResampleUpdate {
    #[serde(default)]
    pub allowed_batch_ids: Option<Vec<JsonValue>>,
    #[serde(default)]
    pub config: Option<ResampleConfigPatch>,
}

impl ResampleUpdate {
    /// Narrow the visible set to the given ids, leaving the config alone.
    pub fn filter<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_batch_ids: Some(ids.into_iter().map(|s| JsonValue::String(s.into())).collect()),
            config: None,
        }
    }

    /// Patch the config without changing the visible set.
    pub fn config(patch: ResampleConfigPatch) -> Self {
        Self {
            allowed_batch_ids: None,
            config: Some(patch),
        }
    }
}

/// Normalized discovery result for one template.
///
/// `all_batches` is the durable selection ledger; `batches` is the subset
/// visible under the active resample filter and is always recomputed from
/// `all_batches`, never mutated on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub name: String,
    pub all_batches: Vec<Batch>,
    pub batches: Vec<Batch>,
    pub batches_count: u64,
    pub rows_total: u64,
    pub field_catalog: Vec<FieldDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery_schema: Option<DiscoverySchema>,
    pub batch_metrics: Vec<BatchMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_bins: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_groups: Option<JsonValue>,
    pub resample: ResampleState,
}

impl DiscoveryResult {
    /// Toggle the selection flag of the batch at `visible_index` in the
    /// currently visible list.
    ///
    /// Identity is resolved by string id against `all_batches`, so the
    /// toggle lands on the durable ledger even when a filter is active.
    /// A stale index is a no-op - this runs inside optimistic UI paths
    /// where the underlying result may have just been replaced.
    pub fn set_batch_selected(&mut self, visible_index: usize, selected: bool) -> bool {
        let Some(target_id) = self.batches.get(visible_index).map(|b| b.id.clone()) else {
            return false;
        };
        let Some(batch) = self.all_batches.iter_mut().find(|b| b.id == target_id) else {
            return false;
        };
        batch.selected = selected;
        self.recompute_visible();
        true
    }

    /// Apply a resample payload: replace the visible-id filter when ids are
    /// provided, merge the config patch when present. Omitting the ids keeps
    /// the previous filter, so a pure config change never disturbs the
    /// visible set. `all_batches` is never touched.
    pub fn apply_resample(&mut self, update: ResampleUpdate) {
        if let Some(ids) = update.allowed_batch_ids {
            let filtered: BTreeSet<String> =
                ids.iter().filter_map(scalar_to_string).collect();
            self.resample.filtered_ids = Some(filtered);
        }
        if let Some(patch) = update.config {
            self.resample.config.apply(patch);
        }
        self.recompute_visible();
    }

    /// Drop the visible-id filter entirely; every batch shows again.
    pub fn clear_resample_filter(&mut self) {
        self.resample.filtered_ids = None;
        self.recompute_visible();
    }

    /// Rebuild `batches` from `all_batches` under the current filter,
    /// preserving `all_batches` order.
    pub fn recompute_visible(&mut self) {
        self.batches = match &self.resample.filtered_ids {
            Some(ids) => self
                .all_batches
                .iter()
                .filter(|b| ids.contains(&b.id))
                .cloned()
                .collect(),
            None => self.all_batches.clone(),
        };
    }

    /// Count of selected batches across the full (unfiltered) ledger.
    pub fn selected_batch_count(&self) -> usize {
        self.all_batches.iter().filter(|b| b.selected).count()
    }

    /// Total rows across selected batches in the full ledger.
    pub fn selected_rows(&self) -> i64 {
        self.all_batches
            .iter()
            .filter(|b| b.selected)
            .map(|b| b.rows)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(id: &str, rows: i64, selected: bool) -> Batch {
        Batch {
            id: id.to_string(),
            rows,
            parent: 1,
            rows_per_parent: rows as f64,
            time: None,
            category: None,
            selected,
        }
    }

    fn result_with(batches: Vec<Batch>) -> DiscoveryResult {
        let mut result = DiscoveryResult {
            name: "orders".to_string(),
            all_batches: batches,
            batches: Vec::new(),
            batches_count: 0,
            rows_total: 0,
            field_catalog: Vec::new(),
            discovery_schema: None,
            batch_metrics: Vec::new(),
            numeric_bins: None,
            category_groups: None,
            resample: ResampleState {
                config: ResampleConfig {
                    dimension: "batch_index".to_string(),
                    metric: "rows".to_string(),
                    sample_size: None,
                },
                filtered_ids: None,
            },
        };
        result.recompute_visible();
        result
    }

    #[test]
    fn toggle_updates_ledger_and_visible_list() {
        let mut result = result_with(vec![batch("1", 10, true), batch("2", 20, true)]);
        assert!(result.set_batch_selected(1, false));
        assert!(!result.all_batches[1].selected);
        assert!(!result.batches[1].selected);
    }

    #[test]
    fn toggle_out_of_range_is_noop() {
        let mut result = result_with(vec![batch("1", 10, true)]);
        let before = result.clone();
        assert!(!result.set_batch_selected(5, false));
        assert_eq!(result, before);
    }

    #[test]
    fn selection_survives_being_filtered_out() {
        let mut result =
            result_with(vec![batch("1", 10, true), batch("2", 20, true), batch("3", 5, true)]);

        // Toggle batch "2" off, then filter it out of view.
        assert!(result.set_batch_selected(1, false));
        result.apply_resample(ResampleUpdate::filter(["1", "3"]));
        assert_eq!(result.batches.len(), 2);
        assert!(result.batches.iter().all(|b| b.id != "2"));

        // Clearing the filter shows "2" again with the toggled value.
        result.clear_resample_filter();
        assert_eq!(result.batches.len(), 3);
        assert!(!result.batches[1].selected);
    }

    #[test]
    fn toggle_through_filtered_view_targets_by_id() {
        let mut result =
            result_with(vec![batch("1", 10, true), batch("2", 20, true), batch("3", 5, true)]);
        result.apply_resample(ResampleUpdate::filter(["3"]));
        assert_eq!(result.batches.len(), 1);

        // Visible index 0 is batch "3", not batch "1".
        assert!(result.set_batch_selected(0, false));
        assert!(result.all_batches[0].selected);
        assert!(result.all_batches[1].selected);
        assert!(!result.all_batches[2].selected);
    }

    #[test]
    fn filter_preserves_ledger_order() {
        let mut result =
            result_with(vec![batch("9", 1, true), batch("4", 1, true), batch("7", 1, true)]);
        result.apply_resample(ResampleUpdate::filter(["7", "9"]));
        let ids: Vec<&str> = result.batches.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["9", "7"]);
    }

    #[test]
    fn config_only_update_keeps_filter() {
        let mut result = result_with(vec![batch("1", 10, true), batch("2", 20, true)]);
        result.apply_resample(ResampleUpdate::filter(["2"]));

        result.apply_resample(ResampleUpdate::config(ResampleConfigPatch {
            dimension: Some("time".to_string()),
            ..Default::default()
        }));

        assert_eq!(result.resample.config.dimension, "time");
        assert_eq!(result.resample.config.metric, "rows");
        assert_eq!(result.batches.len(), 1);
    }

    #[test]
    fn loose_filter_ids_are_coerced_to_strings() {
        let mut result = result_with(vec![batch("1", 10, true), batch("2", 20, true)]);
        let update: ResampleUpdate =
            serde_json::from_str(r#"{"allowed_batch_ids": [2, "missing"]}"#).unwrap();
        result.apply_resample(update);
        assert_eq!(result.batches.len(), 1);
        assert_eq!(result.batches[0].id, "2");
    }

    #[test]
    fn selected_aggregates_use_full_ledger() {
        let mut result = result_with(vec![batch("1", 10, true), batch("2", 20, false)]);
        result.apply_resample(ResampleUpdate::filter(["2"]));
        assert_eq!(result.selected_batch_count(), 1);
        assert_eq!(result.selected_rows(), 10);
    }
}
