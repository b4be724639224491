//! Filesystem access shared by all ranks.

use std::io;
use std::path::Path;

/// The two filesystem operations the diagnostics factory performs.
///
/// Implementations must tolerate several ranks calling `makedirs` on the
/// same path at once: a rank that loses the race still succeeds.
pub trait Filesystem {
    /// Whether `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create `path` and any missing parents. Succeeds if it already exists.
    fn makedirs(&self, path: &Path) -> io::Result<()>;
}

/// The local (or network-mounted) POSIX filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn makedirs(&self, path: &Path) -> io::Result<()> {
        // create_dir_all treats a directory created concurrently by
        // another rank as success.
        std::fs::create_dir_all(path)?;
        log::debug!("created directory {}", path.display());
        Ok(())
    }
}
