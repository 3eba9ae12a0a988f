use std::path::PathBuf;

use log::debug;

use crate::core::{FsBackend, Result};
use crate::ops::{LinkOption, own, parent_must_be_dir};
use crate::{EntryType, FsError, FsPath};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    /// Replace an existing destination (an empty directory or a non-directory).
    pub replace_existing: bool,
    /// With `NoFollow` a symbolic link is copied as a link.
    pub links: LinkOption,
}

/// Makes room at `to`, or fails with `AlreadyExists`.
fn clear_destination<F: FsBackend>(fs: &mut F, to: &FsPath, replace_existing: bool) -> Result<()> {
    if !fs.exists(to, false) {
        return Ok(());
    }
    if !replace_existing {
        return Err(FsError::AlreadyExists(to.as_path().to_path_buf()).into());
    }
    delete(fs, to)
}

/// What [`copy`] recreates at the destination.
enum Source {
    File(Vec<u8>),
    Directory,
    SymLink(PathBuf),
}

/// True if both paths resolve to the very same entry.
fn same_entry<F: FsBackend>(fs: &F, from: &FsPath, to: &FsPath) -> bool {
    match (fs.metadata(from, true), fs.metadata(to, true)) {
        (Ok(a), Ok(b)) => a.file_key() == b.file_key(),
        _ => false,
    }
}

/// Copies one entry. Directories are copied without their content. Copying an entry onto itself,
/// through a link or not, leaves it untouched.
pub fn copy<F: FsBackend>(
    fs: &mut F,
    from: &FsPath,
    to: &FsPath,
    options: CopyOptions,
) -> Result<FsPath> {
    own(fs, from)?;
    own(fs, to)?;
    let meta = fs.metadata(from, options.links.follow())?;
    if from == to || same_entry(fs, from, to) {
        return Ok(to.clone());
    }

    let source = match meta.entry_type() {
        EntryType::File => Source::File(fs.read(from)?),
        EntryType::Directory => Source::Directory,
        EntryType::SymLink => Source::SymLink(fs.read_link(from)?),
    };
    clear_destination(fs, to, options.replace_existing)?;
    parent_must_be_dir(fs, to)?;

    match source {
        Source::File(content) => fs.mkfile(to, Some(content.as_slice()))?,
        Source::Directory => fs.mkdir(to)?,
        Source::SymLink(target) => fs.symlink(to, target)?,
    }
    debug!("copied {from} to {to}");
    Ok(to.clone())
}

/// Moves an entry, with its content if it is a directory.
///
/// Moving the root, or a directory below itself, fails before anything is touched.
pub fn move_entry<F: FsBackend>(
    fs: &mut F,
    from: &FsPath,
    to: &FsPath,
    replace_existing: bool,
) -> Result<FsPath> {
    own(fs, from)?;
    own(fs, to)?;
    fs.metadata(from, false)?;
    if from == to {
        return Ok(to.clone());
    }
    if from.is_root() || to.starts_with(from) {
        return Err(FsError::InvalidPath {
            path: to.to_string(),
            reason: format!("cannot move {from} into itself"),
        }
        .into());
    }
    clear_destination(fs, to, replace_existing)?;
    parent_must_be_dir(fs, to)?;
    fs.rename(from, to)?;
    Ok(to.clone())
}

/// Deletes a file, a link or an empty directory.
pub fn delete<F: FsBackend>(fs: &mut F, path: &FsPath) -> Result<()> {
    own(fs, path)?;
    if fs.metadata(path, false)?.is_dir() {
        let non_empty = fs.ls(path.as_path())?.next().is_some();
        if non_empty {
            return Err(FsError::DirectoryNotEmpty(path.as_path().to_path_buf()).into());
        }
    }
    fs.rm(path)
}

/// Like [`delete`], but a missing entry is not an error. Returns whether something was deleted.
pub fn delete_if_exists<F: FsBackend>(fs: &mut F, path: &FsPath) -> Result<bool> {
    own(fs, path)?;
    if !fs.exists(path, false) {
        return Ok(false);
    }
    delete(fs, path)?;
    Ok(true)
}

/// Deletes an entry and, for a directory, everything below it.
pub fn delete_recursively<F: FsBackend>(fs: &mut F, path: &FsPath) -> Result<()> {
    own(fs, path)?;
    fs.rm(path)
}
