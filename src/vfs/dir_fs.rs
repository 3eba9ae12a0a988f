//! A backend that maps inner paths onto a directory of the host.
//!
//! ### Key Features:
//! - **Confinement**: every inner path resolves below `self.root`. Absolute symlink targets are
//!   written as host paths below the root and mapped back by `read_link()`.
//! - **Normalization**: `.` and `..` are resolved lexically, trailing separators are dropped.
//! - **Creation tracking**: every entry created through the instance is remembered in
//!   `self.created`.
//! - **Auto‑cleanup**: tracked entries and the root parents created by `new()` are removed on
//!   Drop unless `set_auto_clean(false)` was called.

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use log::{debug, trace, warn};

use crate::core::{FsBackend, FsId, Result, utils};
use crate::{EntryType, FsError, Metadata};

/// Host-backed implementation of [`FsBackend`].
///
/// `DirFS` exposes the subtree below an absolute host directory (`root`) as an inner tree whose
/// root is `/`. Queries go straight to the host, so entries created by
/// other processes are visible too.
///
/// ### Usage notes:
/// - `rm()` removes a link, not its target.
/// - `new()` refuses a root it cannot write into.
/// - There is no internal locking; share an instance behind a `Mutex`.
/// - Errors are returned via `anyhow::Result`; domain failures downcast to `FsError`.
///
/// ### Example:
/// ```
/// use vfs_tree::{DirFS, FsBackend};
///
/// let tmp = std::env::temp_dir();
/// let root = tmp.join("vfs_tree_doc_example");
///
/// let mut fs = DirFS::new(root).unwrap();
/// fs.mkdir("/docs").unwrap();
/// fs.mkfile("/docs/note.txt", Some(b"Hello")).unwrap();
/// assert!(fs.exists("/docs/note.txt", true));
///
/// fs.rm("/docs/note.txt").unwrap();
/// ```
pub struct DirFS {
    id: FsId,
    root: PathBuf,                      // host-related absolute normalized path
    created: BTreeSet<PathBuf>,         // inner absolute normalized paths
    created_root_parents: Vec<PathBuf>, // host-related absolute normalized paths
    is_auto_clean: bool,
}

impl DirFS {
    /// Opens the host directory `root` as a backend, creating it (and its missing parents) first.
    /// Fails for an empty or relative `root`, for a `root` that is not a directory and for a
    /// `root` that is not writable. Auto-clean starts enabled.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        if root.as_os_str().is_empty() {
            return Err(anyhow!("invalid root path: empty"));
        }
        if root.is_relative() {
            return Err(anyhow!("the root path must be absolute"));
        }
        if root.exists() && !root.is_dir() {
            return Err(anyhow!("{:?} is not a directory", root));
        }

        let root = utils::normalize(root);

        let mut created_root_parents = Vec::new();
        if !std::fs::exists(&root)? {
            created_root_parents.extend(Self::mkdir_all(&root)?);
        }

        // check permissions
        if !Self::check_permissions(&root) {
            return Err(anyhow!("Access denied: {:?}", root));
        }

        debug!("DirFS rooted at {}", root.display());
        Ok(Self {
            id: FsId::next(),
            root,
            created: BTreeSet::new(),
            created_root_parents,
            is_auto_clean: true,
        })
    }

    /// With `clean` set, entries created through this instance are removed on drop.
    pub fn set_auto_clean(&mut self, clean: bool) {
        self.is_auto_clean = clean;
    }

    fn to_inner<P: AsRef<Path>>(&self, inner_path: P) -> PathBuf {
        utils::normalize(Path::new("/").join(inner_path))
    }

    /// `mkdir -p` for a host path. Returns the directories that had to be created.
    fn mkdir_all<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
        let host_path = path.as_ref().to_path_buf();

        // Looking for the first existing parent
        let mut existed_part = host_path.clone();
        while let Some(parent) = existed_part.parent() {
            let parent_buf = parent.to_path_buf();
            if std::fs::exists(parent)? {
                existed_part = parent_buf;
                break;
            }
            existed_part = parent_buf;
        }

        // Create from the closest existing parent to the target path
        let need_to_create: Vec<_> = host_path
            .strip_prefix(&existed_part)?
            .components()
            .collect();

        let mut created = Vec::new();

        let mut built = PathBuf::from(&existed_part);
        for component in need_to_create {
            built.push(component);
            if !std::fs::exists(&built)? {
                std::fs::create_dir(&built)?;
                created.push(built.clone());
            }
        }

        Ok(created)
    }

    fn check_permissions<P: AsRef<Path>>(path: P) -> bool {
        let path = path.as_ref();
        let filename = path.join(".access");
        if std::fs::write(&filename, b"check").is_err() {
            return false;
        }
        std::fs::remove_file(filename).is_ok()
    }

    /// Host metadata of an inner path. A missing entry is reported as `FsError::NotFound`.
    fn host_metadata(&self, inner: &Path, follow: bool) -> Result<std::fs::Metadata> {
        let host = self.to_host(inner)?;
        let result = if follow {
            std::fs::metadata(&host)
        } else {
            std::fs::symlink_metadata(&host)
        };
        result.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FsError::NotFound(inner.to_path_buf()).into(),
            _ => anyhow::Error::from(e),
        })
    }

    /// Fails with `AlreadyExists` if anything, even a dangling link, is present at `inner`.
    fn require_absent(&self, inner: &Path) -> Result<()> {
        if self.exists(inner, false) {
            return Err(FsError::AlreadyExists(inner.to_path_buf()).into());
        }
        Ok(())
    }

    fn require_parent_dir(&self, inner: &Path) -> Result<()> {
        let parent = inner.parent().unwrap_or(Path::new("/"));
        if !self.host_metadata(parent, true)?.is_dir() {
            return Err(FsError::NotADirectory(parent.to_path_buf()).into());
        }
        Ok(())
    }

    fn require_file(&self, inner: &Path) -> Result<PathBuf> {
        if self.host_metadata(inner, true)?.is_dir() {
            return Err(FsError::IsADirectory(inner.to_path_buf()).into());
        }
        self.to_host(inner)
    }

    fn track(&mut self, inner: PathBuf) {
        debug!("created {}", inner.display());
        self.created.insert(inner);
    }

    fn untrack(&mut self, inner: &Path) {
        self.created.retain(|p| !p.starts_with(inner));
    }
}

impl FsBackend for DirFS {
    fn id(&self) -> FsId {
        self.id
    }

    /// Returns root path related to the host file system.
    fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Returns the path on the host system that matches the specified internal path.
    fn to_host<P: AsRef<Path>>(&self, inner_path: P) -> Result<PathBuf> {
        let inner = self.to_inner(inner_path);
        Ok(self.root.join(inner.strip_prefix("/")?))
    }

    fn exists<P: AsRef<Path>>(&self, path: P, follow: bool) -> bool {
        let inner = self.to_inner(path);
        self.host_metadata(&inner, follow).is_ok()
    }

    fn metadata<P: AsRef<Path>>(&self, path: P, follow: bool) -> Result<Metadata> {
        let inner = self.to_inner(path);
        let meta = self.host_metadata(&inner, follow)?;
        Ok(host::convert(&meta))
    }

    /// Returns an iterator over the immediate children of a directory.
    ///
    /// The iterator holds the host directory handle until it is dropped.
    fn ls<P: AsRef<Path>>(&self, path: P) -> Result<impl Iterator<Item = Result<PathBuf>> + '_> {
        let inner = self.to_inner(path);
        if !self.host_metadata(&inner, true)?.is_dir() {
            return Err(FsError::NotADirectory(inner).into());
        }
        trace!("ls {}", inner.display());
        let read_dir = std::fs::read_dir(self.to_host(&inner)?)?;
        Ok(read_dir.map(move |entry| {
            entry
                .map(|e| inner.join(e.file_name()))
                .map_err(anyhow::Error::from)
        }))
    }

    /// Creates directory and all it parents (if needed).
    fn mkdir<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(anyhow!("invalid path: empty"));
        }

        let inner_path = self.to_inner(path);
        self.require_absent(&inner_path)?;

        // Looking for the first existing parent
        let mut existed_parent = inner_path.clone();
        while let Some(parent) = existed_parent.parent() {
            let parent_buf = parent.to_path_buf();
            if self.exists(parent, false) {
                existed_parent = parent_buf;
                break;
            }
            existed_parent = parent_buf;
        }
        if !self.host_metadata(&existed_parent, true)?.is_dir() {
            return Err(FsError::NotADirectory(existed_parent).into());
        }

        // Create from the closest existing parent to the target path
        let need_to_create: Vec<_> = inner_path
            .strip_prefix(&existed_parent)?
            .components()
            .collect();

        let mut built = existed_parent;
        for component in need_to_create {
            built.push(component);
            std::fs::create_dir(self.to_host(&built)?)?;
            self.track(built.clone());
        }

        Ok(())
    }

    /// Creates a file, with its missing parent directories.
    fn mkfile<P: AsRef<Path>>(&mut self, path: P, content: Option<&[u8]>) -> Result<()> {
        let file_path = self.to_inner(path);
        self.require_absent(&file_path)?;
        if let Some(parent) = file_path.parent() {
            if !self.exists(parent, false) {
                self.mkdir(parent)?;
            }
        }
        self.require_parent_dir(&file_path)?;

        let host = self.to_host(&file_path)?;
        let mut fd = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(host)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => FsError::AlreadyExists(file_path.clone()).into(),
                _ => anyhow::Error::from(e),
            })?;
        self.track(file_path);
        if let Some(content) = content {
            fd.write_all(content)?;
        }
        Ok(())
    }

    fn hard_link<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, link: P, existing: Q) -> Result<()> {
        let link = self.to_inner(link);
        let existing = self.to_inner(existing);
        let target_meta = match self.host_metadata(&existing, false) {
            Ok(meta) => meta,
            Err(e) if FsError::is_not_found(&e) => {
                return Err(FsError::TargetMissing {
                    link,
                    target: existing,
                }
                .into());
            }
            Err(e) => return Err(e),
        };
        if target_meta.is_dir() {
            return Err(FsError::IsADirectory(existing).into());
        }
        self.require_absent(&link)?;
        self.require_parent_dir(&link)?;

        std::fs::hard_link(self.to_host(&existing)?, self.to_host(&link)?)?;
        self.track(link);
        Ok(())
    }

    fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, link: P, target: Q) -> Result<()> {
        let link = self.to_inner(link);
        let target = target.as_ref();
        self.require_absent(&link)?;
        self.require_parent_dir(&link)?;

        let host_target = if target.is_absolute() {
            self.to_host(target)?
        } else {
            target.to_path_buf()
        };
        host::symlink(&host_target, &self.to_host(&link)?)?;
        self.track(link);
        Ok(())
    }

    /// Returns the link target. Targets below the root come back as inner absolute paths,
    /// relative targets are returned unchanged.
    fn read_link<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let inner = self.to_inner(path);
        if !self.host_metadata(&inner, false)?.file_type().is_symlink() {
            return Err(FsError::NotASymLink(inner).into());
        }
        let target = std::fs::read_link(self.to_host(&inner)?)?;
        if target.is_relative() {
            return Ok(target);
        }
        match target.strip_prefix(&self.root) {
            Ok(rest) => Ok(Path::new("/").join(rest)),
            Err(_) => Err(FsError::InvalidPath {
                path: target.display().to_string(),
                reason: "link target is outside of the root".to_string(),
            }
            .into()),
        }
    }

    /// Reads the entire contents of a file into a byte vector.
    fn read<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        let inner = self.to_inner(path);
        let host = self.require_file(&inner)?;
        let mut content = Vec::new();
        std::fs::File::open(&host)?.read_to_end(&mut content)?;

        Ok(content)
    }

    /// Writes bytes to an existing file, replacing its entire contents.
    fn write<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()> {
        let inner = self.to_inner(path);
        let host = self.require_file(&inner)?;
        std::fs::write(&host, content)?;

        Ok(())
    }

    /// Appends bytes to the end of an existing file, preserving its old contents.
    fn append<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()> {
        let inner = self.to_inner(path);
        let host = self.require_file(&inner)?;
        let mut file = OpenOptions::new().append(true).open(&host)?;
        file.write_all(content)?;

        Ok(())
    }

    /// Removes an entry without following links; directories go with their content.
    fn rm<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(anyhow!("invalid path: empty"));
        }
        let inner_path = self.to_inner(path);
        if utils::is_virtual_root(&inner_path) {
            return Err(anyhow!("invalid path: the root cannot be removed"));
        }
        self.host_metadata(&inner_path, false)?;

        utils::rm_on_host(self.to_host(&inner_path)?)?;
        self.untrack(&inner_path);
        debug!("rm {}", inner_path.display());

        Ok(())
    }

    fn rename<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()> {
        let source = self.to_inner(from);
        let destination = self.to_inner(to);
        if utils::is_virtual_root(&source) {
            return Err(anyhow!("invalid path: the root cannot be moved"));
        }
        self.host_metadata(&source, false)?;
        self.require_absent(&destination)?;
        if destination.starts_with(&source) {
            return Err(FsError::InvalidPath {
                path: destination.display().to_string(),
                reason: format!("cannot move {} into itself", source.display()),
            }
            .into());
        }
        self.require_parent_dir(&destination)?;

        std::fs::rename(self.to_host(&source)?, self.to_host(&destination)?)?;

        let moved: Vec<PathBuf> = self
            .created
            .iter()
            .filter(|p| p.starts_with(&source))
            .cloned()
            .collect();
        for old in moved {
            self.created.remove(&old);
            self.created.insert(destination.join(old.strip_prefix(&source)?));
        }
        debug!("mv {} {}", source.display(), destination.display());
        Ok(())
    }

    fn set_mode<P: AsRef<Path>>(&mut self, path: P, mode: u32) -> Result<()> {
        let inner = self.to_inner(path);
        self.host_metadata(&inner, true)?;
        host::set_mode(&self.to_host(&inner)?, mode)
    }

    /// Removes all artifacts (dirs, files and links) created through this instance, but
    /// preserve its root.
    fn cleanup(&mut self) -> bool {
        let mut is_ok = true;

        let created: Vec<PathBuf> = self.created.iter().rev().cloned().collect();
        for entry in created {
            if !self.exists(&entry, false) {
                self.created.remove(&entry);
                continue;
            }
            if let Ok(host) = self.to_host(&entry) {
                match utils::rm_on_host(&host) {
                    Ok(()) => {
                        self.created.remove(&entry);
                    }
                    Err(e) => {
                        is_ok = false;
                        warn!("Unable to remove {}: {}", host.display(), e);
                    }
                }
            }
        }

        is_ok
    }
}

impl Drop for DirFS {
    fn drop(&mut self) {
        if !self.is_auto_clean {
            return;
        }

        if self.cleanup() {
            self.created.clear();
        }

        let errors: Vec<_> = self
            .created_root_parents
            .iter()
            .rev()
            .filter_map(|p| utils::rm_on_host(p).err())
            .collect();
        if !errors.is_empty() {
            warn!("Failed to remove parents: {:?}", errors);
        }

        self.created_root_parents.clear();
    }
}

/// Platform glue for links, modes and ownership.
mod host {
    use std::path::Path;
    use std::time::SystemTime;

    use super::{EntryType, Metadata, Result};

    fn entry_type(meta: &std::fs::Metadata) -> EntryType {
        if meta.file_type().is_symlink() {
            EntryType::SymLink
        } else if meta.is_dir() {
            EntryType::Directory
        } else {
            EntryType::File
        }
    }

    #[cfg(unix)]
    pub fn convert(meta: &std::fs::Metadata) -> Metadata {
        use std::os::unix::fs::MetadataExt;

        Metadata {
            entry_type: entry_type(meta),
            len: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            owner: meta.uid().to_string(),
            mode: meta.mode() & 0o7777,
            file_key: (meta.dev(), meta.ino()),
        }
    }

    #[cfg(not(unix))]
    pub fn convert(meta: &std::fs::Metadata) -> Metadata {
        let mode = if meta.permissions().readonly() { 0o444 } else { 0o666 };
        Metadata {
            entry_type: entry_type(meta),
            len: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            owner: String::new(),
            mode,
            file_key: (0, 0),
        }
    }

    #[cfg(unix)]
    pub fn symlink(target: &Path, link: &Path) -> Result<()> {
        std::os::unix::fs::symlink(target, link)?;
        Ok(())
    }

    #[cfg(windows)]
    pub fn symlink(target: &Path, link: &Path) -> Result<()> {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)?;
        } else {
            std::os::windows::fs::symlink_file(target, link)?;
        }
        Ok(())
    }

    #[cfg(unix)]
    pub fn set_mode(host: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(host, std::fs::Permissions::from_mode(mode & 0o7777))?;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn set_mode(host: &Path, mode: u32) -> Result<()> {
        let mut permissions = std::fs::metadata(host)?.permissions();
        permissions.set_readonly(mode & 0o200 == 0);
        std::fs::set_permissions(host, permissions)?;
        Ok(())
    }
}
