// Key-value storage abstraction for the discovery cache.
//
// Implementations:
// - FsKvArea (one file per key, atomic replace)
// - MemoryKvArea (tests, ephemeral sessions)

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("storage quota exceeded: {attempted} bytes over limit {limit}")]
    QuotaExceeded { attempted: usize, limit: usize },
    #[error("storage i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Durable local key-value area, the persistence surface the cache writes
/// through. Synchronous by design: writes happen inside UI event handling
/// and are small.
pub trait KvArea: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    fn put(&self, key: &str, value: &str) -> Result<(), KvError>;
    fn remove(&self, key: &str) -> Result<(), KvError>;
}

/// In-memory area. A quota can be set to exercise quota-exceeded paths.
#[derive(Debug, Default)]
pub struct MemoryKvArea {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryKvArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Area that rejects any value larger than `limit` bytes.
    pub fn with_quota(limit: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(limit),
        }
    }
}

impl KvArea for MemoryKvArea {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), KvError> {
        if let Some(limit) = self.quota {
            if value.len() > limit {
                return Err(KvError::QuotaExceeded {
                    attempted: value.len(),
                    limit,
                });
            }
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Filesystem-backed area: one file per key under a root directory.
///
/// Writes go to a temp file first and are renamed into place, so a crashed
/// write never leaves a half-written value behind.
#[derive(Debug)]
pub struct FsKvArea {
    root: PathBuf,
    quota: Option<usize>,
}

impl FsKvArea {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, KvError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, quota: None })
    }

    pub fn with_quota(root: impl Into<PathBuf>, limit: usize) -> Result<Self, KvError> {
        let mut area = Self::new(root)?;
        area.quota = Some(limit);
        Ok(area)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(sanitize_key(key))
    }
}

impl KvArea for FsKvArea {
    fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), KvError> {
        if let Some(limit) = self.quota {
            if value.len() > limit {
                return Err(KvError::QuotaExceeded {
                    attempted: value.len(),
                    limit,
                });
            }
        }
        let target = self.path_for(key);
        let tmp = tmp_path(&target);
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KvError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "value".to_string());
    name.push_str(".tmp");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trip() {
        let area = MemoryKvArea::new();
        assert_eq!(area.get("k").unwrap(), None);
        area.put("k", "v").unwrap();
        assert_eq!(area.get("k").unwrap(), Some("v".to_string()));
        area.remove("k").unwrap();
        assert_eq!(area.get("k").unwrap(), None);
    }

    #[test]
    fn memory_quota_rejects_large_values() {
        let area = MemoryKvArea::with_quota(4);
        area.put("k", "ok").unwrap();
        let err = area.put("k", "too large").unwrap_err();
        assert!(matches!(err, KvError::QuotaExceeded { .. }));
        // The previous value is untouched by the failed write.
        assert_eq!(area.get("k").unwrap(), Some("ok".to_string()));
    }

    #[test]
    fn fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let area = FsKvArea::new(dir.path()).unwrap();
        area.put("batchlens.discovery.v1", "{\"results\":{}}").unwrap();
        assert_eq!(
            area.get("batchlens.discovery.v1").unwrap(),
            Some("{\"results\":{}}".to_string())
        );
        area.remove("batchlens.discovery.v1").unwrap();
        assert_eq!(area.get("batchlens.discovery.v1").unwrap(), None);
    }

    #[test]
    fn fs_remove_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let area = FsKvArea::new(dir.path()).unwrap();
        area.remove("never-written").unwrap();
    }

    #[test]
    fn fs_keys_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let area = FsKvArea::new(dir.path()).unwrap();
        area.put("a/b:c", "v").unwrap();
        assert_eq!(area.get("a/b:c").unwrap(), Some("v".to_string()));
        assert!(dir.path().join("a_b_c").exists());
    }
}
