//! Attachment file storage.
//!
//! Files are stored in a sharded directory structure under the attachment
//! root:
//! ```text
//! {root}/
//! ├── ab/
//! │   └── ab12cd34-5678-90ab-cdef-123456789012.pdf
//! ├── cd/
//! │   └── cd90ab12-3456-7890-abcd-ef1234567890.bin
//! └── ...
//! ```
//!
//! Every path is resolved against the canonical root before it is written,
//! read or removed.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::{Result, TempmailError};

/// Longest extension carried over from the filename into the stored name.
const MAX_EXTENSION_LEN: usize = 16;

/// Attachment storage rooted at a single directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    /// Canonical attachment root.
    root: PathBuf,
    /// Per-attachment size ceiling in bytes.
    max_size: u64,
}

impl AttachmentStore {
    /// Open the store, creating the root directory if needed.
    pub fn new(root: impl AsRef<Path>, max_size: u64) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;

        Ok(Self { root, max_size })
    }

    /// Canonical attachment root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-attachment size ceiling in bytes.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// True iff `size` does not exceed the per-attachment ceiling.
    pub fn validate_size(&self, size: u64) -> bool {
        size <= self.max_size
    }

    /// Generate a new UUID-based stored name for a sanitized filename.
    ///
    /// The extension is taken from the filename, `bin` if it has none.
    pub fn generate_stored_name(filename: &str) -> String {
        format!("{}.{}", Uuid::new_v4(), Self::extract_extension(filename))
    }

    fn extract_extension(filename: &str) -> &str {
        Path::new(filename)
            .extension()
            .and_then(|s| s.to_str())
            .filter(|ext| {
                !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or("bin")
    }

    /// Shard directory for a stored name: its first two characters.
    fn get_shard(stored_name: &str) -> &str {
        stored_name.get(..2).unwrap_or(stored_name)
    }

    /// Path a stored name would live at, before resolution.
    pub fn candidate_path(&self, stored_name: &str) -> PathBuf {
        self.root.join(Self::get_shard(stored_name)).join(stored_name)
    }

    /// Resolve a candidate path and check that it lies under the root.
    ///
    /// Relative candidates are taken relative to the root. Symlinks are
    /// followed for every component that exists; the remaining components
    /// must be plain names. The result must be strictly below the root.
    pub fn resolve_storage_path(&self, candidate: impl AsRef<Path>) -> Result<PathBuf> {
        let candidate = candidate.as_ref();
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };

        let mut existing = candidate.as_path();
        let mut missing: Vec<OsString> = Vec::new();
        let mut resolved = loop {
            match existing.canonicalize() {
                Ok(path) => break path,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    let (Some(name), Some(parent)) = (existing.file_name(), existing.parent())
                    else {
                        return Err(escape_error(&candidate));
                    };
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                Err(e) => {
                    return Err(TempmailError::StorageIntegrity(format!(
                        "cannot resolve {}: {e}",
                        candidate.display()
                    )))
                }
            }
        };
        for name in missing.iter().rev() {
            resolved.push(name);
        }

        if resolved == self.root || !resolved.starts_with(&self.root) {
            return Err(escape_error(&candidate));
        }
        Ok(resolved)
    }

    /// Write attachment bytes under a fresh stored name.
    ///
    /// Returns the resolved path of the new file. A file that was only
    /// partially written is removed before the error is returned.
    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf> {
        let stored_name = Self::generate_stored_name(filename);
        let path = self.resolve_storage_path(self.candidate_path(&stored_name))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TempmailError::StorageIntegrity(format!("cannot create shard directory: {e}"))
            })?;
        }

        let result = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .and_then(|mut file| file.write_all(content).and_then(|_| file.sync_all()));

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %cleanup, "Failed to remove partial attachment file");
                }
            }
            return Err(TempmailError::StorageIntegrity(format!(
                "failed to write {}: {e}",
                path.display()
            )));
        }

        Ok(path)
    }

    /// Read a stored attachment.
    pub fn read(&self, storage_path: &str) -> Result<Vec<u8>> {
        let path = self.resolve_storage_path(storage_path)?;

        match fs::read(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(TempmailError::NotFound("attachment file".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored attachment.
    ///
    /// Returns `true` if the file was deleted, `false` if it didn't exist.
    pub fn remove(&self, storage_path: &str) -> Result<bool> {
        let path = self.resolve_storage_path(storage_path)?;

        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove empty shard directories.
    pub fn cleanup_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0;

        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    if let Ok(dir_entries) = fs::read_dir(&path) {
                        if dir_entries.count() == 0 && fs::remove_dir(&path).is_ok() {
                            removed += 1;
                        }
                    }
                }
            }
        }

        Ok(removed)
    }
}

fn escape_error(candidate: &Path) -> TempmailError {
    TempmailError::StorageIntegrity(format!(
        "{} is outside the attachment root",
        candidate.display()
    ))
}
