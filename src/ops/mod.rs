//! Stateless facade over a backend.
//!
//! Every function takes the backend explicitly together with [`FsPath`] values built for it.
//! A path of another backend is rejected with [`FsError::ForeignPath`] (predicates simply
//! answer `false`).

mod create;
mod io;
mod list;
mod manage;
mod query;

pub use create::{
    Creation, create_directories, create_directory, create_file, create_hard_link, create_symlink,
};
pub use io::{WriteOptions, read_all_lines, read_bytes, read_to_string, write_bytes, write_lines};
pub use list::{DirStream, list_directory};
pub use manage::{CopyOptions, copy, delete, delete_if_exists, delete_recursively, move_entry};
pub use query::{
    AttributeValue, LinkOption, attribute, exists, is_directory, is_executable, is_file,
    is_hidden, is_readable, is_same_file, is_symlink, is_writable, last_modified_millis, metadata,
    owner, read_symlink_target, size,
};

use crate::core::{FsBackend, Result};
use crate::{EntryType, FsError, FsPath};

/// Checks that `path` was built for `fs`.
fn own<F: FsBackend>(fs: &F, path: &FsPath) -> Result<()> {
    if path.fs_id() != fs.id() {
        return Err(FsError::ForeignPath(path.as_path().to_path_buf()).into());
    }
    Ok(())
}

/// Type of whatever is present at `path`, following symlinks. A link whose target cannot be
/// resolved reports `SymLink`.
fn existing_type<F: FsBackend>(fs: &F, path: &FsPath) -> Option<EntryType> {
    match fs.metadata(path, true) {
        Ok(meta) => Some(meta.entry_type()),
        Err(_) if fs.exists(path, false) => Some(EntryType::SymLink),
        Err(_) => None,
    }
}

/// Fails unless the parent of `path` is an existing directory.
fn parent_must_be_dir<F: FsBackend>(fs: &F, path: &FsPath) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    match existing_type(fs, &parent) {
        Some(EntryType::Directory) => Ok(()),
        Some(_) => Err(FsError::NotADirectory(parent.as_path().to_path_buf()).into()),
        None => Err(FsError::NotFound(parent.as_path().to_path_buf()).into()),
    }
}
