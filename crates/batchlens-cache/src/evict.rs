// Access-ordered eviction of cached discovery results.
//
// Keeps the most-recently-accessed entries within the entry budget, then
// drops the single oldest remaining entry until the serialized envelope
// fits the byte budget or only one entry remains. A lone entry is kept even
// when oversized: an irreducible large result beats an empty cache.

use std::collections::BTreeMap;

use crate::envelope::{CacheEnvelope, CachedResult};

pub(crate) struct EvictedPayload {
    pub payload: String,
    pub dropped: usize,
}

/// Serialize `results`/`meta` into an envelope that fits the budgets,
/// evicting oldest-accessed entries from the copy as needed. The caller's
/// in-memory map is untouched.
pub(crate) fn evicted_payload(
    results: &BTreeMap<String, CachedResult>,
    meta: &Option<batchlens_core::DiscoveryMeta>,
    ts: i64,
    max_bytes: usize,
    max_entries: usize,
) -> Result<EvictedPayload, serde_json::Error> {
    let mut envelope = CacheEnvelope {
        results: results.clone(),
        meta: meta.clone(),
        ts,
    };
    let mut dropped = 0;

    while envelope.results.len() > max_entries {
        drop_oldest(&mut envelope.results);
        dropped += 1;
    }

    let mut payload = serde_json::to_string(&envelope)?;
    while payload.len() > max_bytes && envelope.results.len() > 1 {
        drop_oldest(&mut envelope.results);
        dropped += 1;
        payload = serde_json::to_string(&envelope)?;
    }

    Ok(EvictedPayload { payload, dropped })
}

/// Remove the entry with the smallest access stamp; ties break on template
/// id so eviction is deterministic.
fn drop_oldest(results: &mut BTreeMap<String, CachedResult>) {
    let oldest = results
        .iter()
        .min_by_key(|(id, entry)| (entry.accessed_at, id.clone()))
        .map(|(id, _)| id.clone());
    if let Some(id) = oldest {
        results.remove(&id);
    }
}
