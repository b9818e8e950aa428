//! Scratch file allocation under a configured root
//!
//! Paths handed out by [`TempFileManager::allocate`] are unique for the
//! lifetime of the process: each name combines a random UUID with a
//! monotonically increasing counter. Deletion is tolerant of files that are
//! already gone, and refuses to touch anything outside the root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};
use uuid::Uuid;

/// Allocates and releases scratch files
#[derive(Debug)]
pub struct TempFileManager {
    root: PathBuf,
    counter: AtomicU64,
}

impl TempFileManager {
    /// Create a manager rooted at `root`; the directory is created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Create a manager under the system temp directory
    pub fn with_defaults() -> Self {
        Self::new(std::env::temp_dir().join("folio"))
    }

    /// The configured temp root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh path inside the root
    ///
    /// The file itself is not created; callers write to the returned path.
    pub fn allocate(&self, extension_hint: &str) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.root)?;

        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        let extension = sanitize_extension(extension_hint);
        let name = if extension.is_empty() {
            format!("{}-{}", Uuid::new_v4().simple(), sequence)
        } else {
            format!("{}-{}.{}", Uuid::new_v4().simple(), sequence, extension)
        };

        let path = self.root.join(name);
        debug!(path = %path.display(), "Allocated temp path");
        Ok(path)
    }

    /// Allocate a path and write `data` to it
    pub fn write(&self, extension_hint: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.allocate(extension_hint)?;
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Delete a previously allocated path
    ///
    /// Missing files are not an error. Paths outside the root are left alone.
    pub fn release(&self, path: &Path) -> io::Result<()> {
        if !self.owns(path) {
            warn!(path = %path.display(), root = %self.root.display(), "Refusing to delete path outside temp root");
            return Ok(());
        }

        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), "Released temp path");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Whether `path` lies inside the temp root
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

fn sanitize_extension(hint: &str) -> String {
    hint.trim()
        .trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase()
}
