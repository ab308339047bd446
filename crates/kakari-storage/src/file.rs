//! File-backed storage.
//!
//! Values live in a single JSON object on disk. Every mutation rewrites the
//! whole document through a uniquely named temp file and an atomic rename, so
//! a reader in another process sees either the old or the new document, never
//! a mix. Concurrent writers in different processes do not corrupt the file;
//! the last rename wins.

use crate::{KeyValueStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use tracing::warn;

type Document = BTreeMap<String, String>;

/// Distinguishes temp files written by threads of the same process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// JSON-file storage shared by every process of the same user.
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StorageResult<Document> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Document::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StorageError::Encoding(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the document before a mutation. An unparseable document is
    /// replaced by an empty one; the flag reports that it must be rewritten.
    fn read_for_update(&self) -> StorageResult<(Document, bool)> {
        match self.read_document() {
            Ok(document) => Ok((document, false)),
            Err(StorageError::Encoding(reason)) => {
                warn!(reason = %reason, "Replacing unreadable storage file");
                Ok((Document::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("storage");
        let nanos = std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp_name = format!(
            ".{}.kakari.tmp.{}.{}.{}",
            file_name,
            std::process::id(),
            nanos,
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        );
        self.path.with_file_name(tmp_name)
    }

    fn write_document(&self, document: &Document) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(document)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp_path = self.temp_path();
        let write_result = (|| -> std::io::Result<()> {
            let mut file = private_file_options().open(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn update<R>(&self, apply: impl FnOnce(&mut Document) -> R) -> StorageResult<R> {
        let _guard = self.write_lock.lock();
        let (mut document, _) = self.read_for_update()?;
        let result = apply(&mut document);
        self.write_document(&document)?;
        Ok(result)
    }
}

/// Fresh file only, readable by the owner alone.
fn private_file_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options
}

impl KeyValueStore for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|doc| {
            doc.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_document()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.update(|doc| doc.remove(key).is_some())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StorageResult<()> {
        self.update(|doc| {
            for (key, value) in entries {
                doc.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        let (mut document, recovered) = self.read_for_update()?;
        let before = document.len();
        for key in keys {
            document.remove(*key);
        }
        if recovered || document.len() != before {
            self.write_document(&document)?;
        }
        Ok(())
    }
}
