// batchlens - Batch discovery cache for report generation
//
// Discovers which data batches exist for a report template and date range,
// caches the normalized results in a size-bounded local store shared across
// windows, and reconciles user selection state against re-fetches.
//
// This crate wires configuration into a running store/session and
// re-exports the public surface of the workspace crates.

mod init;

pub use init::{build_area, build_session, build_store, init_tracing};

pub use batchlens_cache::{
    CacheBudget, CacheEnvelope, CachedResult, DiscoveryStore, FsKvArea, KvArea, KvError,
    MemoryKvArea, StorageChange, StorageListener, SyncBus, STORAGE_KEY,
};
pub use batchlens_config::{
    CacheConfig, FsConfig, LogConfig, LogFormat, RuntimeConfig, StorageBackend, StorageConfig,
};
pub use batchlens_core::{
    normalize_discovery, Batch, BatchMetric, DateRange, DiscoveryMeta, DiscoveryResponse,
    DiscoveryResult, ResampleConfig, ResampleConfigPatch, ResampleUpdate, TemplateRef,
};
pub use batchlens_session::{
    ApiError, DiscoveryApi, DiscoveryRequest, DiscoverySession, DiscoverySummary, QueryContext,
    Readiness, SessionError, TemplateOutcome,
};
