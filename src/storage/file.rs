//! File-backed storage medium: one JSON text file per key.

use std::fs;
use std::path::{Path, PathBuf};

use super::backend::StorageBackend;
use super::StorageError;

const FILE_EXTENSION: &str = "json";

/// Medium that stores each key as a file under a directory.
///
/// Keys are sanitized to a filesystem-safe form; the namespacing done by
/// [`super::KeyValueStore`] keeps sanitized names collision-free in
/// practice.
///
/// # Example
///
/// ```rust,no_run
/// use microbill::storage::FileBackend;
///
/// let backend = FileBackend::new("/var/lib/microbill")?;
/// # Ok::<(), microbill::storage::StorageError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a directory-backed medium.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory the entries live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{FILE_EXTENSION}", sanitize_key(key)))
    }
}

/// Replace characters that are unsafe in file names.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path_for(key)).ok()
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> bool {
        fs::remove_file(self.path_for(key)).is_ok()
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| {
                let path = entry.ok()?.path();
                if path.extension()?.to_str()? != FILE_EXTENSION {
                    return None;
                }
                Some(path.file_stem()?.to_str()?.to_string())
            })
            .collect()
    }

    fn entry_size(&self, key: &str) -> Option<usize> {
        fs::metadata(self.path_for(key))
            .ok()
            .map(|meta| meta.len() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        backend.write("microbill_state", "{\"a\":1}").unwrap();

        let reopened = FileBackend::new(dir.path()).unwrap();
        assert_eq!(
            reopened.read("microbill_state").as_deref(),
            Some("{\"a\":1}")
        );
        assert_eq!(reopened.keys(), vec!["microbill_state".to_string()]);
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        backend.write("k", "v").unwrap();
        assert!(backend.delete("k"));
        assert!(backend.read("k").is_none());
        assert!(!backend.delete("k"));
    }

    #[test]
    fn test_keys_sanitized_but_stable() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        backend.write("ns:config", "1").unwrap();
        assert_eq!(backend.read("ns:config").as_deref(), Some("1"));
        assert_eq!(backend.keys(), vec!["ns_config".to_string()]);
    }
}
