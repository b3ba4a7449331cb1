//! Relay scratch directory.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// Scratch directory owned by the relay.
///
/// The message being relayed is spooled here for the duration of the run.
/// Files left behind by runs that died are removed once they are older
/// than `max_age`.
pub struct ScratchSpool {
    dir: PathBuf,
    max_age: Duration,
}

impl ScratchSpool {
    /// Open the scratch directory, creating it (mode 0700) if needed.
    pub fn new(dir: impl AsRef<Path>, max_age: Duration) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }

        Ok(Self { dir, max_age })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a message into the spool.
    ///
    /// The file is removed when the returned handle is dropped.
    pub fn spool(&self, raw: &[u8]) -> io::Result<SpooledMessage> {
        let path = self.dir.join(format!("{}.eml", uuid::Uuid::new_v4()));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        let spooled = SpooledMessage { path };
        file.write_all(raw)?;
        file.sync_all()?;
        Ok(spooled)
    }

    /// Remove files whose modification time is more than `max_age` before
    /// `now`. Returns the number of files removed.
    pub fn cleanup_stale(&self, now: SystemTime) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to read scratch directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok());
            if age.is_some_and(|age| age > self.max_age) && fs::remove_file(&path).is_ok() {
                debug!(path = %path.display(), "Removed stale scratch file");
                removed += 1;
            }
        }
        removed
    }
}

/// A message spooled to the scratch directory.
#[derive(Debug)]
pub struct SpooledMessage {
    path: PathBuf,
}

impl SpooledMessage {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpooledMessage {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn test_spooled_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let spool = ScratchSpool::new(dir.path().join("scratch"), DAY).unwrap();

        let spooled = spool.spool(b"raw message").unwrap();
        let path = spooled.path().to_path_buf();
        assert_eq!(fs::read(&path).unwrap(), b"raw message");

        drop(spooled);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let spool = ScratchSpool::new(dir.path().join("scratch"), DAY).unwrap();
        let mode = fs::metadata(spool.dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_cleanup_removes_only_stale_files() {
        let dir = TempDir::new().unwrap();
        let spool = ScratchSpool::new(dir.path(), DAY).unwrap();
        let leftover = dir.path().join("leftover.eml");
        fs::write(&leftover, b"old").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        assert_eq!(spool.cleanup_stale(SystemTime::now()), 0);
        assert!(leftover.exists());

        let later = SystemTime::now() + DAY + Duration::from_secs(3600);
        assert_eq!(spool.cleanup_stale(later), 1);
        assert!(!leftover.exists());
        assert!(dir.path().join("subdir").exists());
    }

    #[test]
    fn test_cleanup_of_missing_directory_is_noop() {
        let dir = TempDir::new().unwrap();
        let spool = ScratchSpool::new(dir.path().join("scratch"), DAY).unwrap();
        fs::remove_dir(spool.dir()).unwrap();
        assert_eq!(spool.cleanup_stale(SystemTime::now()), 0);
    }
}
