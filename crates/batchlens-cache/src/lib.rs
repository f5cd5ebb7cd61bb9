// batchlens-cache - Durable, size-bounded discovery result cache
//
// Persists normalized discovery results to a local key-value area under a
// fixed key, evicting least-recently-accessed templates past the byte or
// entry budget, and replaying storage-change events from other windows with
// last-writer-wins semantics.

mod envelope;
mod evict;
pub mod kv;
mod store;
pub mod sync;

pub use envelope::{CacheEnvelope, CachedResult, STORAGE_KEY};
pub use kv::{FsKvArea, KvArea, KvError, MemoryKvArea};
pub use store::{CacheBudget, DiscoveryStore};
pub use sync::{StorageChange, StorageListener, SyncBus};
