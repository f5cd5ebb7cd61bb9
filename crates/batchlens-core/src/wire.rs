// Inbound wire shapes for the batch-discovery response.
//
// Every field the server may omit or send with a loose type is modeled as
// Option/Value here. Nothing outside the normalization boundary should ever
// touch these types directly.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::normalize::NormalizeError;
use crate::types::{DiscoverySchema, FieldDescriptor};

/// Raw batch-discovery response as the reporting API returns it.
///
/// Scalars arrive as string or number interchangeably; whole sections may be
/// absent. Deserializing never fails for an object payload - coercion and
/// defaulting happen in [`crate::normalize`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryResponse {
    #[serde(default)]
    pub batches: Vec<RawBatch>,
    #[serde(default)]
    pub batches_count: Option<JsonValue>,
    #[serde(default)]
    pub rows_total: Option<JsonValue>,
    #[serde(default)]
    pub field_catalog: Vec<FieldDescriptor>,
    #[serde(default)]
    pub discovery_schema: Option<DiscoverySchema>,
    #[serde(default)]
    pub batch_metrics: Option<Vec<RawBatchMetric>>,
    #[serde(default)]
    pub numeric_bins: Option<JsonValue>,
    #[serde(default)]
    pub category_groups: Option<JsonValue>,
}

impl DiscoveryResponse {
    /// Parse a response body. This is the only place a malformed payload can
    /// fail; past this point everything degrades to defaults.
    pub fn from_slice(body: &[u8]) -> Result<Self, NormalizeError> {
        serde_json::from_slice(body).map_err(NormalizeError::Decode)
    }
}

/// One discovered batch, as loosely shaped as the server sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBatch {
    #[serde(default)]
    pub id: Option<JsonValue>,
    #[serde(default)]
    pub rows: Option<JsonValue>,
    #[serde(default)]
    pub parent: Option<JsonValue>,
    #[serde(default)]
    pub time: Option<JsonValue>,
    #[serde(default)]
    pub category: Option<JsonValue>,
    #[serde(default)]
    pub selected: Option<bool>,
}

/// Server-supplied per-batch chart metrics row.
///
/// Coerced through the same boundary as synthesized rows so downstream chart
/// code cannot tell the two apart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBatchMetric {
    #[serde(default)]
    pub batch_index: Option<JsonValue>,
    #[serde(default)]
    pub batch_id: Option<JsonValue>,
    #[serde(default)]
    pub rows: Option<JsonValue>,
    #[serde(default)]
    pub parent: Option<JsonValue>,
    #[serde(default)]
    pub rows_per_parent: Option<JsonValue>,
    #[serde(default)]
    pub time: Option<JsonValue>,
    #[serde(default)]
    pub category: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_deserializes() {
        let resp = DiscoveryResponse::from_slice(b"{}").unwrap();
        assert!(resp.batches.is_empty());
        assert!(resp.batch_metrics.is_none());
    }

    #[test]
    fn loose_scalars_are_accepted() {
        let body = br#"{
            "batches": [
                {"id": 7, "rows": "120", "parent": 3},
                {"rows": 50, "selected": false}
            ],
            "rows_total": "170"
        }"#;
        let resp = DiscoveryResponse::from_slice(body).unwrap();
        assert_eq!(resp.batches.len(), 2);
        assert_eq!(resp.batches[0].id, Some(serde_json::json!(7)));
        assert_eq!(resp.batches[1].selected, Some(false));
    }

    #[test]
    fn non_object_payload_fails() {
        assert!(DiscoveryResponse::from_slice(b"[1, 2]").is_err());
        assert!(DiscoveryResponse::from_slice(b"not json").is_err());
    }
}
