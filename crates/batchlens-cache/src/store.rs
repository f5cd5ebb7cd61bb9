// Discovery cache store.
//
// Write-through cache of normalized discovery results keyed by template id.
// The in-memory map is the source of truth for the current session; the
// key-value area is a durable convenience. Cache and reconciliation
// operations never fail outward - malformed persisted state and stale
// references degrade to empty/no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

use batchlens_core::{DiscoveryMeta, DiscoveryResult, ResampleUpdate};
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::envelope::{CacheEnvelope, CachedResult, STORAGE_KEY};
use crate::evict;
use crate::kv::{KvArea, KvError};
use crate::sync::{StorageChange, StorageListener};

/// Size bounds for the persisted envelope.
#[derive(Debug, Clone, Copy)]
pub struct CacheBudget {
    /// Serialized envelope byte budget.
    pub max_bytes: usize,
    /// Template entry budget.
    pub max_entries: usize,
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024,
            max_entries: 50,
        }
    }
}

#[derive(Default)]
struct StoreState {
    results: BTreeMap<String, CachedResult>,
    meta: Option<DiscoveryMeta>,
}

/// Durable per-template discovery result cache.
///
/// Explicitly constructed and passed by reference to whoever needs it; one
/// instance per session window.
pub struct DiscoveryStore {
    budget: CacheBudget,
    key: String,
    area: Arc<dyn KvArea>,
    state: Mutex<StoreState>,
}

impl DiscoveryStore {
    pub fn new(area: Arc<dyn KvArea>, budget: CacheBudget) -> Self {
        Self {
            budget,
            key: STORAGE_KEY.to_string(),
            area,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Construct and immediately hydrate from the storage area.
    pub fn open(area: Arc<dyn KvArea>, budget: CacheBudget) -> Self {
        let store = Self::new(area, budget);
        store.load();
        store
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Replace in-memory state with whatever the storage area holds.
    ///
    /// Absent or unparseable payloads become the empty envelope; a payload
    /// over the byte budget is deleted outright rather than salvaged.
    pub fn load(&self) {
        let raw = match self.area.get(&self.key) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "failed to read discovery cache, starting empty");
                None
            }
        };

        let envelope = match raw {
            None => CacheEnvelope::default(),
            Some(payload) if payload.len() > self.budget.max_bytes => {
                warn!(
                    bytes = payload.len(),
                    limit = self.budget.max_bytes,
                    "discarding oversized discovery cache"
                );
                if let Err(err) = self.area.remove(&self.key) {
                    warn!(error = %err, "failed to delete oversized discovery cache");
                }
                CacheEnvelope::default()
            }
            Some(payload) => serde_json::from_str(&payload).unwrap_or_else(|err| {
                debug!(error = %err, "unparseable discovery cache, starting empty");
                CacheEnvelope::default()
            }),
        };

        let mut state = self.state.lock();
        state.results = envelope.results;
        state.meta = envelope.meta;
    }

    /// Store a freshly normalized result for a template and persist.
    pub fn insert_result(&self, template_id: &str, result: DiscoveryResult) {
        let now = Utc::now().timestamp_millis();
        let mut state = self.state.lock();
        state.results.insert(
            template_id.to_string(),
            CachedResult {
                result,
                accessed_at: now,
            },
        );
        self.persist_state(&mut state, now);
    }

    /// Replace the shared discovery context and persist.
    pub fn set_meta(&self, meta: DiscoveryMeta) {
        let now = Utc::now().timestamp_millis();
        let mut state = self.state.lock();
        state.meta = Some(meta);
        self.persist_state(&mut state, now);
    }

    /// Toggle selection of the batch at `visible_index` for a template.
    /// Returns false (and changes nothing) on a stale template or index.
    pub fn toggle_batch(&self, template_id: &str, visible_index: usize, selected: bool) -> bool {
        self.mutate_result(template_id, |result| {
            result.set_batch_selected(visible_index, selected)
        })
    }

    /// Apply a resample payload to a template's result.
    /// Returns false on a stale template reference.
    pub fn apply_resample(&self, template_id: &str, update: ResampleUpdate) -> bool {
        self.mutate_result(template_id, |result| {
            result.apply_resample(update);
            true
        })
    }

    /// Drop a template's visible-id filter.
    pub fn clear_resample_filter(&self, template_id: &str) -> bool {
        self.mutate_result(template_id, |result| {
            result.clear_resample_filter();
            true
        })
    }

    fn mutate_result<F>(&self, template_id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut DiscoveryResult) -> bool,
    {
        let now = Utc::now().timestamp_millis();
        let mut state = self.state.lock();
        let Some(entry) = state.results.get_mut(template_id) else {
            return false;
        };
        if !mutate(&mut entry.result) {
            return false;
        }
        entry.accessed_at = now;
        self.persist_state(&mut state, now);
        true
    }

    pub fn get(&self, template_id: &str) -> Option<DiscoveryResult> {
        self.state
            .lock()
            .results
            .get(template_id)
            .map(|entry| entry.result.clone())
    }

    pub fn meta(&self) -> Option<DiscoveryMeta> {
        self.state.lock().meta.clone()
    }

    pub fn template_ids(&self) -> Vec<String> {
        self.state.lock().results.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().results.is_empty()
    }

    /// Drop everything, in memory and in storage. Used when the query
    /// context changes: results are meaningless outside the template set
    /// and date range that produced them.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.results.clear();
        state.meta = None;
        if let Err(err) = self.area.remove(&self.key) {
            warn!(error = %err, "failed to clear discovery cache");
        }
    }

    /// Write the current state through to the storage area, evicting the
    /// persisted copy down to budget.
    pub fn persist(&self) {
        let now = Utc::now().timestamp_millis();
        let mut state = self.state.lock();
        self.persist_state(&mut state, now);
    }

    fn persist_state(&self, state: &mut StoreState, now_ms: i64) {
        // Reuse existing stamps; only unstamped entries get now.
        for entry in state.results.values_mut() {
            if entry.accessed_at == 0 {
                entry.accessed_at = now_ms;
            }
        }

        let evicted = match evict::evicted_payload(
            &state.results,
            &state.meta,
            now_ms,
            self.budget.max_bytes,
            self.budget.max_entries,
        ) {
            Ok(evicted) => evicted,
            Err(err) => {
                warn!(error = %err, "failed to serialize discovery cache, write abandoned");
                return;
            }
        };

        if evicted.dropped > 0 {
            debug!(
                dropped = evicted.dropped,
                kept = state.results.len().saturating_sub(evicted.dropped),
                "evicted discovery cache entries to fit budget"
            );
        }

        match self.area.put(&self.key, &evicted.payload) {
            Ok(()) => {}
            Err(KvError::QuotaExceeded { attempted, limit }) => {
                // A partially-written value is worse than none at all.
                warn!(attempted, limit, "storage quota exceeded, dropping persisted cache");
                if let Err(err) = self.area.remove(&self.key) {
                    warn!(error = %err, "failed to delete discovery cache after quota error");
                }
            }
            Err(err) => {
                warn!(error = %err, "discovery cache write failed, write abandoned");
            }
        }
    }
}

impl StorageListener for DiscoveryStore {
    /// Another window rewrote the shared area: replace in-memory state with
    /// the parsed value, or reset to empty when it is gone or unparseable.
    fn on_storage_change(&self, change: &StorageChange) {
        if change.key != self.key {
            return;
        }
        let envelope = change
            .new_value
            .as_deref()
            .and_then(|payload| serde_json::from_str::<CacheEnvelope>(payload).ok())
            .unwrap_or_default();

        let mut state = self.state.lock();
        state.results = envelope.results;
        state.meta = envelope.meta;
    }
}
