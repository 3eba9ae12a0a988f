//! In-memory backend: names, inodes and link resolution without touching the host.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use anyhow::anyhow;
use log::{debug, trace};

use crate::core::{FsBackend, FsId, Result, utils};
use crate::vfs::Entry;
use crate::{EntryType, FsError, Metadata};

const MAX_SYMLINK_HOPS: usize = 40;
const DEFAULT_OWNER: &str = "user";

#[derive(Debug, Clone)]
struct Inode {
    content: Vec<u8>,
    mode: u32,
    owner: String,
    modified: SystemTime,
    links: usize,
}

/// A virtual file system (VFS) implementation that stores file and directory entries in memory.
///
/// `MapFS` keeps two maps: names and inodes. A name (`Entry`) points at an inode, which holds
/// content, permission bits, owner and modification time. Hard links are several names sharing
/// one inode, symbolic links are names that carry a target path.
///
/// ### Internal state
///
/// * `root`: An absolute host path that serves as the hypothetical anchor of the VFS. It has no
///   effect on VFS operation, it is only used by `to_host()`.
///
/// * `entries`: All names, keyed by **inner absolute normalized paths**. `BTreeMap` keeps
///   listings deterministic.
///
/// * `inodes`: Attribute and content storage, reference counted by the number of names.
///
/// ### Invariants
///
/// 1. **Root existence**: `/` is never removed and is always a `Directory`.
/// 2. **Path normalization**: All keys in `entries` are normalized.
/// 3. **Parent consistency**: For any entry at `/a/b/c`, there is an entry `/a/b` of type
///    `Directory`.
/// 4. **Link counting**: An inode lives exactly as long as at least one entry refers to it.
///
/// ### Symbolic links
///
/// Every operation resolves symlinks in intermediate components. Whether the last component is
/// followed depends on the operation: `metadata()` and `exists()` take a flag, `read()`,
/// `write()` and `ls()` follow, `rm()`, `rename()`, `read_link()` and `hard_link()` do not.
/// Relative link targets are resolved against the directory containing the link.
///
/// ### Thread Safety
///
/// This struct is **not thread‑safe by default**. Wrap it in a `Mutex` at the application level
/// if concurrent access is required.
///
/// ### Example
///
/// ```
/// use vfs_tree::{FsBackend, MapFS};
///
/// let mut fs = MapFS::new();
///
/// fs.mkdir("/docs").unwrap();
/// fs.mkfile("/docs/note.txt", Some(b"Hello")).unwrap();
/// fs.symlink("/note", "/docs/note.txt").unwrap();
///
/// assert_eq!(fs.read("/note").unwrap(), b"Hello");
///
/// fs.rm("/docs/note.txt").unwrap();
/// assert!(!fs.exists("/note", true));
/// assert!(fs.exists("/note", false));
/// ```
pub struct MapFS {
    id: FsId,
    root: PathBuf,                     // host-related absolute normalized path
    entries: BTreeMap<PathBuf, Entry>, // inner absolute normalized paths
    inodes: BTreeMap<u64, Inode>,
    next_inode: u64,
    owner: String,
}

impl MapFS {
    /// Creates an empty tree holding only `/`.
    /// The host root is `/` and entries are owned by `user`.
    pub fn new() -> Self {
        Self::with_owner(DEFAULT_OWNER)
    }

    /// Creates new MapFS instance whose entries are owned by `owner`.
    pub fn with_owner(owner: &str) -> Self {
        let mut fs = Self {
            id: FsId::next(),
            root: PathBuf::from("/"),
            entries: BTreeMap::new(),
            inodes: BTreeMap::new(),
            next_inode: 1,
            owner: owner.to_string(),
        };
        let inode = fs.alloc_inode(0o755, Vec::new());
        fs.entries
            .insert(PathBuf::from("/"), Entry::new(EntryType::Directory, inode));
        fs
    }

    /// Changes root path.
    /// `path` only affects `to_host()` and must be absolute.
    pub fn set_root<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(anyhow!("root path must be an absolute"));
        }
        self.root = path.to_path_buf();
        Ok(())
    }

    /// Changes the owner of an entry (symlinks are followed).
    pub fn set_owner<P: AsRef<Path>>(&mut self, path: P, owner: &str) -> Result<()> {
        let (_, entry) = self.entry(path, true)?;
        let inode = entry.inode();
        self.inode_mut(inode)?.owner = owner.to_string();
        Ok(())
    }

    fn to_inner<P: AsRef<Path>>(&self, inner_path: P) -> PathBuf {
        utils::normalize(Path::new("/").join(inner_path))
    }

    fn alloc_inode(&mut self, mode: u32, content: Vec<u8>) -> u64 {
        let id = self.next_inode;
        self.next_inode += 1;
        self.inodes.insert(
            id,
            Inode {
                content,
                mode,
                owner: self.owner.clone(),
                modified: SystemTime::now(),
                links: 1,
            },
        );
        id
    }

    fn inode_mut(&mut self, id: u64) -> Result<&mut Inode> {
        self.inodes
            .get_mut(&id)
            .ok_or_else(|| anyhow!("dangling inode {id}"))
    }

    fn unlink_inode(&mut self, id: u64) {
        if let Some(inode) = self.inodes.get_mut(&id) {
            inode.links -= 1;
            if inode.links == 0 {
                self.inodes.remove(&id);
            }
        }
    }

    /// Resolves symlinks component by component. Missing components are kept as they are, so
    /// the result names the location an entry would be created at.
    fn resolve(&self, path: &Path, follow_last: bool) -> Result<PathBuf> {
        let mut pending: VecDeque<OsString> = Self::names(path).collect();
        let mut resolved = PathBuf::from("/");
        let mut hops = 0;

        while let Some(name) = pending.pop_front() {
            let candidate = resolved.join(&name);
            let is_last = pending.is_empty();
            match self.entries.get(&candidate).and_then(Entry::target) {
                Some(target) if !is_last || follow_last => {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(FsError::SymlinkLoop(path.to_path_buf()).into());
                    }
                    trace!("{} -> {}", candidate.display(), target.display());
                    let expanded = utils::normalize(resolved.join(target));
                    for name in Self::names(&expanded).rev().collect::<Vec<_>>() {
                        pending.push_front(name);
                    }
                    resolved = PathBuf::from("/");
                }
                _ => resolved = candidate,
            }
        }

        Ok(resolved)
    }

    fn names(path: &Path) -> impl DoubleEndedIterator<Item = OsString> + '_ {
        path.components().filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_os_string()),
            _ => None,
        })
    }

    fn entry<P: AsRef<Path>>(&self, path: P, follow: bool) -> Result<(PathBuf, &Entry)> {
        let inner = self.to_inner(path);
        let resolved = self.resolve(&inner, follow)?;
        match self.entries.get(&resolved) {
            Some(entry) => Ok((resolved, entry)),
            None => Err(FsError::NotFound(inner).into()),
        }
    }

    /// Resolves the location a new entry named by `path` would take. Intermediate symlinks are
    /// followed, the last component never is.
    fn new_entry_location<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let inner = self.to_inner(path);
        if utils::is_virtual_root(&inner) {
            return Err(FsError::AlreadyExists(inner).into());
        }
        let location = self.resolve(&inner, false)?;
        if self.entries.contains_key(&location) {
            return Err(FsError::AlreadyExists(inner).into());
        }
        Ok(location)
    }

    /// Checks that the parent of an absent `location` is an existing directory.
    fn require_parent_dir(&self, location: &Path) -> Result<()> {
        let parent = location.parent().unwrap_or(Path::new("/"));
        match self.entries.get(parent) {
            Some(entry) if entry.is_dir() => Ok(()),
            Some(_) => Err(FsError::NotADirectory(parent.to_path_buf()).into()),
            None => Err(FsError::NotFound(parent.to_path_buf()).into()),
        }
    }

    fn file_inode<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
        let (resolved, entry) = self.entry(path, true)?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory(resolved).into());
        }
        Ok(entry.inode())
    }
}

impl Default for MapFS {
    fn default() -> Self {
        Self::new()
    }
}

impl FsBackend for MapFS {
    fn id(&self) -> FsId {
        self.id
    }

    /// Returns root path.
    fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Returns a hypothetical "host-path" joining `root` and `inner_path`.
    fn to_host<P: AsRef<Path>>(&self, inner_path: P) -> Result<PathBuf> {
        let inner = self.to_inner(inner_path);
        Ok(self.root.join(inner.strip_prefix("/")?))
    }

    fn exists<P: AsRef<Path>>(&self, path: P, follow: bool) -> bool {
        self.entry(path, follow).is_ok()
    }

    fn metadata<P: AsRef<Path>>(&self, path: P, follow: bool) -> Result<Metadata> {
        let (_, entry) = self.entry(path, follow)?;
        let inode = &self.inodes[&entry.inode()];
        let len = match entry.entry_type() {
            EntryType::File => inode.content.len() as u64,
            EntryType::SymLink => entry
                .target()
                .map(|t| t.as_os_str().len() as u64)
                .unwrap_or(0),
            EntryType::Directory => 0,
        };
        Ok(Metadata {
            entry_type: entry.entry_type(),
            len,
            modified: inode.modified,
            owner: inode.owner.clone(),
            mode: inode.mode,
            file_key: (self.id.get(), entry.inode()),
        })
    }

    /// Returns an iterator over the immediate children of a directory.
    ///
    /// Children are collected when the call is made; later changes to the VFS are not visible
    /// through an iterator obtained before them.
    fn ls<P: AsRef<Path>>(&self, path: P) -> Result<impl Iterator<Item = Result<PathBuf>> + '_> {
        let (dir, entry) = self.entry(path, true)?;
        if !entry.is_dir() {
            return Err(FsError::NotADirectory(dir).into());
        }
        trace!("ls {}", dir.display());
        let children: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .cloned()
            .collect();
        Ok(children.into_iter().map(Ok))
    }

    /// Creates directory and all it parents (if needed).
    fn mkdir<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(anyhow!("invalid path: empty"));
        }
        let location = self.new_entry_location(path)?;

        // closest existing ancestor
        let mut existed_parent = location.clone();
        while let Some(parent) = existed_parent.parent() {
            let parent_buf = parent.to_path_buf();
            if self.entries.contains_key(parent) {
                existed_parent = parent_buf;
                break;
            }
            existed_parent = parent_buf;
        }
        if !self.entries[&existed_parent].is_dir() {
            return Err(FsError::NotADirectory(existed_parent).into());
        }

        let need_to_create: Vec<_> = location
            .strip_prefix(&existed_parent)?
            .components()
            .collect();

        let mut built = existed_parent;
        for component in need_to_create {
            built.push(component);
            let inode = self.alloc_inode(0o755, Vec::new());
            self.entries
                .insert(built.clone(), Entry::new(EntryType::Directory, inode));
            debug!("mkdir {}", built.display());
        }

        Ok(())
    }

    /// Creates a file, with its missing parent directories.
    fn mkfile<P: AsRef<Path>>(&mut self, path: P, content: Option<&[u8]>) -> Result<()> {
        let location = self.new_entry_location(path)?;
        if let Some(parent) = location.parent() {
            if !self.entries.contains_key(parent) {
                self.mkdir(parent)?;
            }
        }
        self.require_parent_dir(&location)?;

        let inode = self.alloc_inode(0o644, content.map(<[u8]>::to_vec).unwrap_or_default());
        self.entries
            .insert(location.clone(), Entry::new(EntryType::File, inode));
        debug!("mkfile {}", location.display());
        Ok(())
    }

    fn hard_link<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, link: P, existing: Q) -> Result<()> {
        let link = link.as_ref();
        let (target, entry) = match self.entry(&existing, false) {
            Ok(found) => found,
            Err(e) if FsError::is_not_found(&e) => {
                return Err(FsError::TargetMissing {
                    link: self.to_inner(link),
                    target: self.to_inner(existing),
                }
                .into());
            }
            Err(e) => return Err(e),
        };
        if entry.is_dir() {
            return Err(FsError::IsADirectory(target).into());
        }
        let entry = entry.clone();

        let location = self.new_entry_location(link)?;
        self.require_parent_dir(&location)?;

        self.inode_mut(entry.inode())?.links += 1;
        self.entries.insert(location.clone(), entry);
        debug!("link {} => {}", location.display(), target.display());
        Ok(())
    }

    fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, link: P, target: Q) -> Result<()> {
        let location = self.new_entry_location(link)?;
        self.require_parent_dir(&location)?;

        let inode = self.alloc_inode(0o777, Vec::new());
        self.entries
            .insert(location.clone(), Entry::symlink(inode, &target));
        debug!("symlink {} -> {}", location.display(), target.as_ref().display());
        Ok(())
    }

    fn read_link<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let (resolved, entry) = self.entry(path, false)?;
        entry
            .target()
            .map(Path::to_path_buf)
            .ok_or_else(|| FsError::NotASymLink(resolved).into())
    }

    /// Reads the entire contents of a file into a byte vector.
    fn read<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        let inode = self.file_inode(path)?;
        Ok(self.inodes[&inode].content.clone())
    }

    /// Writes bytes to an existing file, replacing its entire contents.
    fn write<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()> {
        let id = self.file_inode(path)?;
        let inode = self.inode_mut(id)?;
        inode.content = content.to_vec();
        inode.modified = SystemTime::now();
        Ok(())
    }

    /// Appends bytes to the end of an existing file, preserving its old contents.
    fn append<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()> {
        let id = self.file_inode(path)?;
        let inode = self.inode_mut(id)?;
        inode.content.extend_from_slice(content);
        inode.modified = SystemTime::now();
        Ok(())
    }

    /// Removes a file, link or directory at the specified path.
    /// If the path is a directory, all its contents are removed recursively.
    fn rm<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(anyhow!("invalid path: empty"));
        }
        if utils::is_virtual_root(self.to_inner(&path)) {
            return Err(anyhow!("invalid path: the root cannot be removed"));
        }

        let (inner_path, _) = self.entry(path, false)?;

        // Collect all entries that start with `inner_path`
        let removed: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|&pb| pb.starts_with(&inner_path))
            .cloned()
            .collect();

        for p in &removed {
            if let Some(entry) = self.entries.remove(p) {
                self.unlink_inode(entry.inode());
            }
        }
        debug!("rm {} ({} entries)", inner_path.display(), removed.len());

        Ok(())
    }

    fn rename<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()> {
        let (source, _) = self.entry(from, false)?;
        if utils::is_virtual_root(&source) {
            return Err(anyhow!("invalid path: the root cannot be moved"));
        }
        let destination = self.new_entry_location(to)?;
        if destination.starts_with(&source) {
            return Err(FsError::InvalidPath {
                path: destination.display().to_string(),
                reason: format!("cannot move {} into itself", source.display()),
            }
            .into());
        }
        self.require_parent_dir(&destination)?;

        let moved: Vec<PathBuf> = self
            .entries
            .keys()
            .filter(|&pb| pb.starts_with(&source))
            .cloned()
            .collect();
        for old in moved {
            if let Some(entry) = self.entries.remove(&old) {
                let new = destination.join(old.strip_prefix(&source)?);
                self.entries.insert(utils::normalize(new), entry);
            }
        }
        debug!("mv {} {}", source.display(), destination.display());
        Ok(())
    }

    fn set_mode<P: AsRef<Path>>(&mut self, path: P, mode: u32) -> Result<()> {
        let (_, entry) = self.entry(path, true)?;
        let inode = entry.inode();
        self.inode_mut(inode)?.mode = mode & 0o7777;
        Ok(())
    }

    /// Removes all artifacts (dirs, files and links) in vfs, but preserve its root.
    fn cleanup(&mut self) -> bool {
        let sorted_paths_to_remove: BTreeSet<PathBuf> = self
            .entries
            .keys()
            .filter(|pb| !utils::is_virtual_root(pb))
            .cloned()
            .collect();

        for entry in sorted_paths_to_remove.iter().rev() {
            if let Some(removed) = self.entries.remove(entry) {
                self.unlink_inode(removed.inode());
            }
        }

        true
    }
}
