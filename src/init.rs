// Initialization utilities
//
// Storage area and logging/tracing setup from RuntimeConfig

use std::sync::Arc;

use anyhow::Result;
use batchlens_cache::{CacheBudget, DiscoveryStore, FsKvArea, KvArea, MemoryKvArea};
use batchlens_config::{LogFormat, RuntimeConfig, StorageBackend};
use batchlens_session::{DiscoveryApi, DiscoverySession};
use tracing::info;

/// Build the key-value area from RuntimeConfig
pub fn build_area(config: &RuntimeConfig) -> Result<Arc<dyn KvArea>> {
    let area: Arc<dyn KvArea> = match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage area");
            Arc::new(MemoryKvArea::new())
        }
        StorageBackend::Fs => {
            let fs = config
                .storage
                .fs
                .as_ref()
                .expect("fs config required for filesystem backend");
            info!("Using filesystem storage area at: {}", fs.path);
            Arc::new(FsKvArea::new(&fs.path)?)
        }
    };
    Ok(area)
}

/// Build a hydrated discovery store from RuntimeConfig
pub fn build_store(config: &RuntimeConfig) -> Result<Arc<DiscoveryStore>> {
    let area = build_area(config)?;
    let budget = CacheBudget {
        max_bytes: config.cache.max_bytes,
        max_entries: config.cache.max_entries,
    };
    Ok(Arc::new(DiscoveryStore::open(area, budget)))
}

/// Build a discovery session over the given API backend
pub fn build_session(
    config: &RuntimeConfig,
    api: Arc<dyn DiscoveryApi>,
) -> Result<Arc<DiscoverySession>> {
    let store = build_store(config)?;
    Ok(Arc::new(DiscoverySession::new(store, api)))
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log = config.log.clone().unwrap_or_default();

    let env_filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    match log.format {
        LogFormat::Json => {
            registry.with(fmt::layer().json()).init();
        }
        LogFormat::Text => {
            registry.with(fmt::layer()).init();
        }
    }
}
