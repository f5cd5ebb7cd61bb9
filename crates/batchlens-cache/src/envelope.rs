// Persisted cache envelope format (storage key suffix v1).

use std::collections::BTreeMap;

use batchlens_core::{DiscoveryMeta, DiscoveryResult};
use serde::{Deserialize, Serialize};

/// Fixed namespaced storage key; cross-window notifications are filtered by
/// exact match on it. The `v1` suffix versions the envelope format.
pub const STORAGE_KEY: &str = "batchlens.discovery.v1";

/// One cached template result with its access stamp.
///
/// `accessed_at` is epoch milliseconds, refreshed on every write to the
/// entry. A zero stamp (absent in the stored payload) is replaced at the
/// next persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    #[serde(flatten)]
    pub result: DiscoveryResult,
    #[serde(rename = "_accessedAt", default)]
    pub accessed_at: i64,
}

/// What actually lands in the key-value area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    #[serde(default)]
    pub results: BTreeMap<String, CachedResult>,
    #[serde(default)]
    pub meta: Option<DiscoveryMeta>,
    /// Envelope write timestamp, epoch milliseconds.
    #[serde(default)]
    pub ts: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessed_at_round_trips_with_stamp_name() {
        let result: DiscoveryResult = serde_json::from_value(serde_json::json!({
            "name": "orders",
            "all_batches": [],
            "batches": [],
            "batches_count": 0,
            "rows_total": 0,
            "field_catalog": [],
            "batch_metrics": [],
            "resample": {"config": {"dimension": "batch_index", "metric": "rows"}}
        }))
        .unwrap();

        let cached = CachedResult {
            result,
            accessed_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&cached).unwrap();
        assert_eq!(json["_accessedAt"], 1_700_000_000_000_i64);
        assert_eq!(json["name"], "orders");

        let back: CachedResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, cached);
    }

    #[test]
    fn stamp_defaults_to_zero_when_absent() {
        let json = serde_json::json!({
            "name": "orders",
            "all_batches": [],
            "batches": [],
            "batches_count": 0,
            "rows_total": 0,
            "field_catalog": [],
            "batch_metrics": [],
            "resample": {"config": {"dimension": "batch_index", "metric": "rows"}}
        });
        let cached: CachedResult = serde_json::from_value(json).unwrap();
        assert_eq!(cached.accessed_at, 0);
    }
}
