use std::fmt::Display;
use std::time::UNIX_EPOCH;

use crate::core::{FsBackend, Result};
use crate::ops::own;
use crate::{FsError, FsPath, Metadata};

const MAX_LINK_CHAIN: usize = 40;

/// Whether the last component of a path is resolved when it is a symbolic link.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinkOption {
    #[default]
    Follow,
    NoFollow,
}

impl LinkOption {
    pub(crate) fn follow(self) -> bool {
        self == LinkOption::Follow
    }
}

/// Value returned by [`attribute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Bool(bool),
    Number(u64),
    Text(String),
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Number(n) => write!(f, "{n}"),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

fn lookup<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> Option<Metadata> {
    if path.fs_id() != fs.id() {
        return None;
    }
    fs.metadata(path, links.follow()).ok()
}

pub fn exists<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> bool {
    path.fs_id() == fs.id() && fs.exists(path, links.follow())
}

pub fn is_file<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> bool {
    lookup(fs, path, links).is_some_and(|m| m.is_file())
}

pub fn is_directory<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> bool {
    lookup(fs, path, links).is_some_and(|m| m.is_dir())
}

/// True if `path` itself is a symbolic link, dangling or not.
pub fn is_symlink<F: FsBackend>(fs: &F, path: &FsPath) -> bool {
    lookup(fs, path, LinkOption::NoFollow).is_some_and(|m| m.is_symlink())
}

/// Dot-files are hidden. The root never is. With `Follow`, a symbolic link is judged by the
/// name of the entry it resolves to.
pub fn is_hidden<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> bool {
    let mut path = path.clone();
    if links.follow() {
        let mut hops = 0;
        while is_symlink(fs, &path) {
            hops += 1;
            let Ok(target) = read_symlink_target(fs, &path) else {
                return false;
            };
            if hops > MAX_LINK_CHAIN {
                return false;
            }
            path = target;
        }
    }
    path.file_name().is_some_and(|name| name.starts_with('.'))
}

// Permission checks look at the owner bits.

pub fn is_readable<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> bool {
    lookup(fs, path, links).is_some_and(|m| m.mode() & 0o400 != 0)
}

pub fn is_writable<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> bool {
    lookup(fs, path, links).is_some_and(|m| m.mode() & 0o200 != 0)
}

pub fn is_executable<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> bool {
    lookup(fs, path, links).is_some_and(|m| m.mode() & 0o100 != 0)
}

/// True if both paths name the same file, e.g. through a hard or symbolic link.
pub fn is_same_file<F: FsBackend>(
    fs: &F,
    a: &FsPath,
    b: &FsPath,
    links: LinkOption,
) -> Result<bool> {
    own(fs, a)?;
    own(fs, b)?;
    if a == b {
        return Ok(true);
    }
    let a = fs.metadata(a, links.follow())?;
    let b = fs.metadata(b, links.follow())?;
    Ok(a.file_key() == b.file_key())
}

pub fn metadata<F: FsBackend>(fs: &F, path: &FsPath, links: LinkOption) -> Result<Metadata> {
    own(fs, path)?;
    fs.metadata(path, links.follow())
}

/// Resolves the target of a symbolic link. Relative targets are taken from the directory
/// containing the link.
pub fn read_symlink_target<F: FsBackend>(fs: &F, path: &FsPath) -> Result<FsPath> {
    own(fs, path)?;
    let target = fs.read_link(path)?;
    if target.is_absolute() {
        return Ok(FsPath::from_inner(fs.id(), target));
    }
    let base = path.parent().unwrap_or_else(|| FsPath::root(fs.id()));
    Ok(FsPath::from_inner(fs.id(), base.as_path().join(target)))
}

pub fn size<F: FsBackend>(fs: &F, path: &FsPath) -> Result<u64> {
    Ok(metadata(fs, path, LinkOption::Follow)?.len())
}

pub fn last_modified_millis<F: FsBackend>(fs: &F, path: &FsPath) -> Result<u64> {
    let modified = metadata(fs, path, LinkOption::Follow)?.modified();
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0))
}

pub fn owner<F: FsBackend>(fs: &F, path: &FsPath) -> Result<String> {
    Ok(metadata(fs, path, LinkOption::Follow)?.owner().to_string())
}

/// Reads one attribute by name.
///
/// Supported names are `size`, `lastModifiedTime` (milliseconds), `owner`, `permissions`
/// (`rwxr-xr-x` form), `isDirectory`, `isRegularFile`, `isSymbolicLink` and `fileKey`. A view
/// prefix (`basic:`, `posix:`, `unix:`) is accepted and ignored.
pub fn attribute<F: FsBackend>(
    fs: &F,
    path: &FsPath,
    name: &str,
    links: LinkOption,
) -> Result<AttributeValue> {
    let meta = metadata(fs, path, links)?;
    let attr = name.split_once(':').map_or(name, |(_, attr)| attr);
    let value = match attr {
        "size" => AttributeValue::Number(meta.len()),
        "lastModifiedTime" => AttributeValue::Number(
            meta.modified()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        ),
        "owner" => AttributeValue::Text(meta.owner().to_string()),
        "permissions" => AttributeValue::Text(permissions_string(meta.mode())),
        "isDirectory" => AttributeValue::Bool(meta.is_dir()),
        "isRegularFile" => AttributeValue::Bool(meta.is_file()),
        "isSymbolicLink" => AttributeValue::Bool(meta.is_symlink()),
        "fileKey" => {
            let (dev, ino) = meta.file_key();
            AttributeValue::Text(format!("(dev={dev},ino={ino})"))
        }
        _ => return Err(FsError::UnknownAttribute(name.to_string()).into()),
    };
    Ok(value)
}

fn permissions_string(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}
