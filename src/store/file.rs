use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use super::{SettingsBackend, StoreError, StoreResult};

/// File-per-key settings backend.
///
/// Each key maps to one file under the data directory. An optional byte
/// capacity bounds the total size of all stored values, standing in for the
/// quota a browser-style key-value store would enforce; writes that would
/// push the total past the capacity fail with [`StoreError::QuotaExceeded`].
pub struct FileBackend {
    dir: PathBuf,
    capacity: Option<usize>,
}

impl FileBackend {
    /// Open (and create if needed) the data directory.
    pub fn new(dir: impl Into<PathBuf>, capacity: Option<usize>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|err| StoreError::backend(format!("creating {}", dir.display()), err))?;
        Ok(Self { dir, capacity })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Total bytes currently stored, excluding the entry for `skip`.
    fn used_bytes_except(&self, skip: &Path) -> StoreResult<usize> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|err| StoreError::backend(format!("listing {}", self.dir.display()), err))?;

        let mut used = 0usize;
        for entry in entries {
            let entry =
                entry.map_err(|err| StoreError::backend("reading directory entry", err))?;
            if entry.path() == skip {
                continue;
            }
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_file() {
                    used += metadata.len() as usize;
                }
            }
        }
        Ok(used)
    }
}

impl SettingsBackend for FileBackend {
    fn load(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::backend(format!("reading `{key}`"), err)),
        }
    }

    fn save(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.key_path(key);
        if let Some(capacity) = self.capacity {
            let needed = self.used_bytes_except(&path)? + value.len();
            if needed > capacity {
                return Err(StoreError::QuotaExceeded { needed, capacity });
            }
        }
        fs::write(&path, value)
            .map_err(|err| StoreError::backend(format!("writing `{key}`"), err))
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::backend(format!("removing `{key}`"), err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_backend(capacity: Option<usize>) -> FileBackend {
        let dir = std::env::temp_dir().join(format!("buzzdeck-store-{}", uuid::Uuid::new_v4()));
        FileBackend::new(dir, capacity).unwrap()
    }

    #[test]
    fn load_missing_key_returns_none() {
        let backend = temp_backend(None);
        assert!(backend.load("absent").unwrap().is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let backend = temp_backend(None);
        backend.save("config_v1", "{\"headerTitle\":\"x\"}").unwrap();
        assert_eq!(
            backend.load("config_v1").unwrap().as_deref(),
            Some("{\"headerTitle\":\"x\"}")
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let backend = temp_backend(None);
        backend.save("k", "v").unwrap();
        backend.remove("k").unwrap();
        backend.remove("k").unwrap();
        assert!(backend.load("k").unwrap().is_none());
    }

    #[test]
    fn oversized_write_is_rejected_as_quota() {
        let backend = temp_backend(Some(16));
        let err = backend.save("k", &"x".repeat(32)).unwrap_err();
        assert!(err.is_quota_exceeded());
        assert!(backend.load("k").unwrap().is_none());
    }

    #[test]
    fn capacity_counts_all_keys() {
        let backend = temp_backend(Some(16));
        backend.save("a", &"x".repeat(10)).unwrap();
        assert!(backend.save("b", &"y".repeat(10)).unwrap_err().is_quota_exceeded());
        // Overwriting an existing key only counts the new value once.
        backend.save("a", &"z".repeat(14)).unwrap();
    }
}
