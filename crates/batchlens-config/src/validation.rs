// Configuration validation

use anyhow::{bail, Result};

use crate::{RuntimeConfig, StorageBackend};

pub(crate) fn validate_config(config: &RuntimeConfig) -> Result<()> {
    if config.cache.max_entries == 0 {
        bail!("cache.max_entries must be at least 1");
    }
    if config.cache.max_bytes < 1024 {
        bail!(
            "cache.max_bytes must be at least 1024, got {}",
            config.cache.max_bytes
        );
    }

    if config.storage.backend == StorageBackend::Fs {
        match &config.storage.fs {
            Some(fs) if !fs.path.trim().is_empty() => {}
            _ => bail!("storage.fs.path is required for the fs storage backend"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FsConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_entry_budget_is_rejected() {
        let mut config = RuntimeConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn tiny_byte_budget_is_rejected() {
        let mut config = RuntimeConfig::default();
        config.cache.max_bytes = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fs_backend_requires_path() {
        let mut config = RuntimeConfig::default();
        config.storage.backend = StorageBackend::Fs;
        assert!(config.validate().is_err());

        config.storage.fs = Some(FsConfig {
            path: "/tmp/batchlens".to_string(),
        });
        assert!(config.validate().is_ok());
    }
}
