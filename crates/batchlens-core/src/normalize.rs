// Normalization boundary for discovery responses.
//
// Applies the coercion and defaulting rules that turn a loose server payload
// into a DiscoveryResult. Deterministic for the same input: normalizing the
// same response twice yields identical batch lists.

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{
    Batch, BatchMetric, ChartDefaults, DiscoveryResult, DiscoverySchema, FieldDescriptor,
    ResampleConfig, ResampleState, TemplateRef,
};
use crate::wire::{DiscoveryResponse, RawBatch, RawBatchMetric};

/// Errors at the parse edge of the boundary. Everything past a successful
/// parse degrades to defaults instead of failing.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to decode discovery response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Convert one raw discovery response into a [`DiscoveryResult`] for the
/// given template.
///
/// Output batch order equals input order: the positional index doubles as
/// the fallback identifier, so stability matters for repeatable selection
/// across refetches of the same query.
pub fn normalize_discovery(response: &DiscoveryResponse, template: &TemplateRef) -> DiscoveryResult {
    let all_batches: Vec<Batch> = response
        .batches
        .iter()
        .enumerate()
        .map(|(index, raw)| normalize_batch(index, raw))
        .collect();

    let rows_total = response
        .rows_total
        .as_ref()
        .and_then(coerce_count)
        .map(|n| n.max(0) as u64)
        .unwrap_or_else(|| all_batches.iter().map(|b| b.rows.max(0) as u64).sum());

    let batches_count = response
        .batches_count
        .as_ref()
        .and_then(coerce_count)
        .map(|n| n.max(0) as u64)
        .unwrap_or(all_batches.len() as u64);

    let defaults = chart_defaults(response.discovery_schema.as_ref(), &response.field_catalog);

    let batch_metrics = match &response.batch_metrics {
        Some(raw) => raw
            .iter()
            .enumerate()
            .map(|(index, metric)| normalize_metric(index, metric))
            .collect(),
        None => synthesize_metrics(&all_batches),
    };

    let mut result = DiscoveryResult {
        name: template.name.clone(),
        all_batches,
        batches: Vec::new(),
        batches_count,
        rows_total,
        field_catalog: response.field_catalog.clone(),
        discovery_schema: response.discovery_schema.clone(),
        batch_metrics,
        numeric_bins: response.numeric_bins.clone(),
        category_groups: response.category_groups.clone(),
        resample: ResampleState {
            config: ResampleConfig {
                dimension: defaults.dimension,
                metric: defaults.metric,
                sample_size: None,
            },
            filtered_ids: None,
        },
    };
    result.recompute_visible();
    result
}

fn normalize_batch(index: usize, raw: &RawBatch) -> Batch {
    let id = raw
        .id
        .as_ref()
        .and_then(scalar_to_string)
        .unwrap_or_else(|| (index + 1).to_string());
    let rows = raw.rows.as_ref().and_then(coerce_count).unwrap_or(0);
    let parent = raw.parent.as_ref().and_then(coerce_count).unwrap_or(0);
    let safe_parent = if parent == 0 { 1 } else { parent };

    Batch {
        id,
        rows,
        parent,
        rows_per_parent: rows as f64 / safe_parent as f64,
        time: raw.time.clone(),
        category: raw.category.clone(),
        selected: raw.selected.unwrap_or(true),
    }
}

/// Pick the dimension/metric pair a results chart opens with.
///
/// Server-declared defaults win. Otherwise: `time` if the field catalog has
/// it, else `category`, else `batch_index`; and `rows`, else
/// `rows_per_parent`, else `parent`. The chain order is load-bearing.
pub fn chart_defaults(
    schema: Option<&DiscoverySchema>,
    catalog: &[FieldDescriptor],
) -> ChartDefaults {
    let declared = schema.and_then(|s| s.defaults.as_ref());
    let has = |name: &str| catalog.iter().any(|f| f.name == name);

    let dimension = declared
        .and_then(|d| d.dimension.clone())
        .unwrap_or_else(|| {
            if has("time") {
                "time"
            } else if has("category") {
                "category"
            } else {
                "batch_index"
            }
            .to_string()
        });

    let metric = declared.and_then(|d| d.metric.clone()).unwrap_or_else(|| {
        if has("rows") {
            "rows"
        } else if has("rows_per_parent") {
            "rows_per_parent"
        } else {
            "parent"
        }
        .to_string()
    });

    ChartDefaults { dimension, metric }
}

fn normalize_metric(index: usize, raw: &RawBatchMetric) -> BatchMetric {
    let batch_index = raw
        .batch_index
        .as_ref()
        .and_then(coerce_count)
        .map(|n| n.max(0) as usize)
        .unwrap_or(index);
    let rows = raw.rows.as_ref().and_then(coerce_count).unwrap_or(0);
    let parent = raw.parent.as_ref().and_then(coerce_count).unwrap_or(0);
    let safe_parent = if parent == 0 { 1 } else { parent };
    let rows_per_parent = raw
        .rows_per_parent
        .as_ref()
        .and_then(coerce_float)
        .unwrap_or(rows as f64 / safe_parent as f64);

    BatchMetric {
        batch_index,
        batch_id: raw
            .batch_id
            .as_ref()
            .and_then(scalar_to_string)
            .unwrap_or_else(|| (index + 1).to_string()),
        rows,
        parent,
        rows_per_parent,
        time: raw.time.clone(),
        category: raw.category.clone(),
    }
}

/// Build the per-batch metrics rows the server did not supply, using the
/// same field names a server-supplied array carries.
fn synthesize_metrics(batches: &[Batch]) -> Vec<BatchMetric> {
    batches
        .iter()
        .enumerate()
        .map(|(index, batch)| BatchMetric {
            batch_index: index,
            batch_id: batch.id.clone(),
            rows: batch.rows,
            parent: batch.parent,
            rows_per_parent: batch.rows_per_parent,
            time: batch.time.clone(),
            category: batch.category.clone(),
        })
        .collect()
}

/// String form of a loose scalar identifier. Non-scalars have no string form.
pub(crate) fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => Some(n.to_string()),
        },
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integer count from a loose scalar; strings parse, anything else is absent.
fn coerce_count(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        JsonValue::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn coerce_float(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
