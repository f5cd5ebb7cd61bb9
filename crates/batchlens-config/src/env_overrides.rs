// Environment variable overrides, applied after file sources.
//
// All keys share the BATCHLENS_ prefix:
//   BATCHLENS_CACHE_MAX_BYTES, BATCHLENS_CACHE_MAX_ENTRIES,
//   BATCHLENS_STORAGE_BACKEND, BATCHLENS_STORAGE_PATH,
//   BATCHLENS_LOG_LEVEL, BATCHLENS_LOG_FORMAT

use anyhow::{Context, Result};

use crate::{FsConfig, LogConfig, RuntimeConfig};

pub const ENV_PREFIX: &str = "BATCHLENS_";

/// Environment access seam so overrides are testable without touching the
/// process environment.
pub trait EnvSource {
    /// Value for a key under the BATCHLENS_ prefix.
    fn get(&self, key: &str) -> Option<String>;
}

pub(crate) fn apply_env_overrides(config: &mut RuntimeConfig, env: &dyn EnvSource) -> Result<()> {
    if let Some(value) = env.get("CACHE_MAX_BYTES") {
        config.cache.max_bytes = value
            .parse()
            .with_context(|| format!("Invalid BATCHLENS_CACHE_MAX_BYTES: {}", value))?;
    }
    if let Some(value) = env.get("CACHE_MAX_ENTRIES") {
        config.cache.max_entries = value
            .parse()
            .with_context(|| format!("Invalid BATCHLENS_CACHE_MAX_ENTRIES: {}", value))?;
    }
    if let Some(value) = env.get("STORAGE_BACKEND") {
        config.storage.backend = value.parse()?;
    }
    if let Some(path) = env.get("STORAGE_PATH") {
        config.storage.fs = Some(FsConfig { path });
    }
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.get_or_insert_with(LogConfig::default).level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.get_or_insert_with(LogConfig::default).format = format.parse()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogFormat, StorageBackend};
    use std::collections::HashMap;

    struct FakeEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for FakeEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| (*v).to_string())
        }
    }

    #[test]
    fn overrides_apply_over_defaults() {
        let mut config = RuntimeConfig::default();
        let env = FakeEnv(HashMap::from([
            ("CACHE_MAX_BYTES", "4096"),
            ("CACHE_MAX_ENTRIES", "5"),
            ("STORAGE_BACKEND", "fs"),
            ("STORAGE_PATH", "/tmp/cache"),
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "json"),
        ]));

        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.cache.max_bytes, 4096);
        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.fs.unwrap().path, "/tmp/cache");
        let log = config.log.unwrap();
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
    }

    #[test]
    fn absent_keys_leave_config_alone() {
        let mut config = RuntimeConfig::default();
        let env = FakeEnv(HashMap::new());
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.cache.max_entries, 50);
        assert!(config.log.is_none());
    }

    #[test]
    fn invalid_number_is_an_error() {
        let mut config = RuntimeConfig::default();
        let env = FakeEnv(HashMap::from([("CACHE_MAX_BYTES", "plenty")]));
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("BATCHLENS_CACHE_MAX_BYTES"));
    }
}
