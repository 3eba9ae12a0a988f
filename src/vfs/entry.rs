use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Directory,
    SymLink,
}

/// A name in the `MapFS` namespace. Several entries may share one inode (hard links).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    entry_type: EntryType,
    inode: u64,
    target: Option<PathBuf>,
}

impl Entry {
    pub fn new(entry_type: EntryType, inode: u64) -> Entry {
        Entry {
            entry_type,
            inode,
            target: None,
        }
    }

    pub fn symlink<P: AsRef<Path>>(inode: u64, target: P) -> Entry {
        Entry {
            entry_type: EntryType::SymLink,
            inode,
            target: Some(target.as_ref().to_path_buf()),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn inode(&self) -> u64 {
        self.inode
    }

    /// Link target; `None` unless this is a symbolic link.
    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }
}

/// Backend-independent snapshot of an entry's attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub(crate) entry_type: EntryType,
    pub(crate) len: u64,
    pub(crate) modified: SystemTime,
    pub(crate) owner: String,
    pub(crate) mode: u32,
    pub(crate) file_key: (u64, u64),
}

impl Metadata {
    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type == EntryType::SymLink
    }

    /// Size in bytes. For symlinks this is the length of the target path.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Permission bits, e.g. `0o644`.
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// `(device, inode)`-like identity. Two names share a key only if they are the same file.
    pub fn file_key(&self) -> (u64, u64) {
        self.file_key
    }
}
