use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Metadata;

pub(crate) mod utils;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Process-unique identity of a backend instance.
///
/// Paths remember the backend they were built for, so two paths with the same text but
/// different backends never compare equal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FsId(u64);

impl FsId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        FsId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A filesystem namespace the facade and the tree builder operate on.
///
/// All paths are *inner* paths: absolute paths are taken from the backend root `/`, relative
/// paths are resolved against it as well. `.` and `..` are resolved lexically.
///
/// Creation primitives are strict: `mkdir`, `mkfile`, `hard_link` and `symlink` fail with
/// [`FsError::AlreadyExists`](crate::FsError::AlreadyExists) if anything is present at the
/// target path. Idempotent creation lives in the facade ([`crate::ops`]).
pub trait FsBackend {
    /// Identity of this backend.
    fn id(&self) -> FsId;

    /// Returns root path related to the host file system.
    fn root(&self) -> &Path;

    /// Maps an inner path to the (possibly hypothetical) host path.
    fn to_host<P: AsRef<Path>>(&self, inner_path: P) -> Result<PathBuf>;

    /// Checks if `path` exists. With `follow` set, a symlink counts only if its target exists.
    fn exists<P: AsRef<Path>>(&self, path: P, follow: bool) -> bool;

    /// Returns metadata of `path`, of the link itself unless `follow` is set.
    fn metadata<P: AsRef<Path>>(&self, path: P, follow: bool) -> Result<Metadata>;

    /// Lazily lists the immediate children of the directory `path`, in backend order.
    fn ls<P: AsRef<Path>>(&self, path: P) -> Result<impl Iterator<Item = Result<PathBuf>> + '_>;

    /// Creates directory and all it parents (if needed).
    fn mkdir<P: AsRef<Path>>(&mut self, path: P) -> Result<()>;

    /// Creates a new file, and its missing parents, with optional initial content.
    fn mkfile<P: AsRef<Path>>(&mut self, path: P, content: Option<&[u8]>) -> Result<()>;

    /// Creates `link` as a hard link to the existing entry `existing`.
    fn hard_link<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, link: P, existing: Q) -> Result<()>;

    /// Creates `link` as a symbolic link pointing at `target`, which may not exist.
    fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, link: P, target: Q) -> Result<()>;

    /// Returns the target a symbolic link points at.
    fn read_link<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf>;

    fn read<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>>;

    /// Replaces the content of an existing file.
    fn write<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()>;

    fn append<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()>;

    /// Removes an entry; directories are removed with their content. Links are removed, not
    /// their targets.
    fn rm<P: AsRef<Path>>(&mut self, path: P) -> Result<()>;

    /// Moves an entry to a path that must not exist yet.
    fn rename<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()>;

    /// Sets permission bits (`0o755` style) of an entry, following symlinks.
    fn set_mode<P: AsRef<Path>>(&mut self, path: P, mode: u32) -> Result<()>;

    /// Removes all artifacts (dirs and files), but preserve the root.
    fn cleanup(&mut self) -> bool;
}
