use std::fmt::Display;
use std::path::{Component, Path, PathBuf};

use crate::core::{FsBackend, FsId, Result, utils};
use crate::errors::FsError;

/// A location inside one backend.
///
/// The inner path is always absolute and normalized. Equality includes the backend identity:
/// `/a` of one `MapFS` is not equal to `/a` of another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FsPath {
    fs: FsId,
    inner: PathBuf,
}

/// Base of a [`join`].
#[derive(Debug, Clone, Copy)]
pub enum PathLike<'a> {
    /// The backend root.
    Root,
    /// An existing path; it must belong to the backend passed to [`join`].
    Path(&'a FsPath),
    /// A path string, taken from the backend root.
    Str(&'a str),
}

impl<'a> From<&'a FsPath> for PathLike<'a> {
    fn from(path: &'a FsPath) -> Self {
        PathLike::Path(path)
    }
}

impl<'a> From<&'a str> for PathLike<'a> {
    fn from(path: &'a str) -> Self {
        PathLike::Str(path)
    }
}

/// Builds a path of `fs` by appending `segments` to `base`.
///
/// Segments may contain separators; `.` and `..` are resolved lexically and never climb above the
/// root. A segment containing a NUL byte is rejected with [`FsError::InvalidPath`], a base path of
/// another backend with [`FsError::ForeignPath`].
///
/// ```
/// use vfs_tree::{MapFS, PathLike, join};
///
/// let fs = MapFS::new();
/// let dir = join(&fs, PathLike::Root, &["my", "path"]).unwrap();
/// let file = join(&fs, PathLike::Path(&dir), &["to/file"]).unwrap();
/// assert_eq!(file.to_string(), "/my/path/to/file");
/// assert_eq!(file, join(&fs, "/my/path/to/file".into(), &[]).unwrap());
/// ```
pub fn join<F: FsBackend>(fs: &F, base: PathLike<'_>, segments: &[&str]) -> Result<FsPath> {
    let mut path = match base {
        PathLike::Root => FsPath::root(fs.id()),
        PathLike::Path(existing) => {
            if existing.fs != fs.id() {
                return Err(FsError::ForeignPath(existing.inner.clone()).into());
            }
            existing.clone()
        }
        PathLike::Str(raw) => FsPath::root(fs.id()).join(raw)?,
    };
    for segment in segments {
        path = path.join(segment)?;
    }
    Ok(path)
}

impl FsPath {
    pub(crate) fn root(fs: FsId) -> Self {
        Self {
            fs,
            inner: PathBuf::from("/"),
        }
    }

    pub(crate) fn from_inner<P: AsRef<Path>>(fs: FsId, inner: P) -> Self {
        Self {
            fs,
            inner: utils::normalize(Path::new("/").join(inner)),
        }
    }

    /// Identity of the backend the path belongs to.
    pub fn fs_id(&self) -> FsId {
        self.fs
    }

    /// The absolute inner path.
    pub fn as_path(&self) -> &Path {
        &self.inner
    }

    pub fn is_root(&self) -> bool {
        utils::is_virtual_root(&self.inner)
    }

    /// Appends a segment. Absolute segments are appended too, not substituted.
    pub fn join(&self, segment: &str) -> Result<FsPath> {
        if segment.contains('\0') {
            return Err(FsError::InvalidPath {
                path: segment.escape_default().to_string(),
                reason: "contains a NUL byte".to_string(),
            }
            .into());
        }
        let relative = segment.trim_start_matches('/');
        Ok(Self::from_inner(self.fs, self.inner.join(relative)))
    }

    /// The parent directory, `None` for the root.
    pub fn parent(&self) -> Option<FsPath> {
        self.inner.parent().map(|p| FsPath {
            fs: self.fs,
            inner: p.to_path_buf(),
        })
    }

    /// Last component, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.file_name().and_then(|name| name.to_str())
    }

    pub fn starts_with(&self, base: &FsPath) -> bool {
        self.fs == base.fs && self.inner.starts_with(&base.inner)
    }

    /// Relative path leading from `self` to `other`.
    ///
    /// ```
    /// use vfs_tree::{MapFS, PathLike, join};
    /// use std::path::PathBuf;
    ///
    /// let fs = MapFS::new();
    /// let a = join(&fs, "/a/b".into(), &[]).unwrap();
    /// let c = join(&fs, "/a/c/d".into(), &[]).unwrap();
    /// assert_eq!(a.relativize(&c).unwrap(), PathBuf::from("../c/d"));
    /// ```
    pub fn relativize(&self, other: &FsPath) -> Result<PathBuf> {
        if self.fs != other.fs {
            return Err(FsError::ForeignPath(other.inner.clone()).into());
        }
        let from: Vec<Component> = self.inner.components().collect();
        let to: Vec<Component> = other.inner.components().collect();
        let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

        let mut result = PathBuf::new();
        for _ in common..from.len() {
            result.push("..");
        }
        for component in &to[common..] {
            result.push(component);
        }
        Ok(result)
    }
}

impl AsRef<Path> for FsPath {
    fn as_ref(&self) -> &Path {
        &self.inner
    }
}

impl Display for FsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MapFS;

    #[test]
    fn join_from_root() -> Result<()> {
        let fs = MapFS::new();
        let path = join(&fs, PathLike::Root, &["my", "path"])?;
        assert_eq!(path.as_path(), Path::new("/my/path"));
        assert_eq!(path.fs_id(), fs.id());
        Ok(())
    }

    #[test]
    fn join_normalizes() -> Result<()> {
        let fs = MapFS::new();
        let path = join(&fs, "/my/./path/".into(), &["../to", "file"])?;
        assert_eq!(path.to_string(), "/my/to/file");

        let above_root = join(&fs, PathLike::Root, &["../../x"])?;
        assert_eq!(above_root.to_string(), "/x");
        Ok(())
    }

    #[test]
    fn join_absolute_segment_is_appended() -> Result<()> {
        let fs = MapFS::new();
        let base = join(&fs, "/base".into(), &[])?;
        let path = join(&fs, PathLike::Path(&base), &["/child"])?;
        assert_eq!(path.to_string(), "/base/child");
        Ok(())
    }

    #[test]
    fn join_rejects_nul() {
        let fs = MapFS::new();
        let err = join(&fs, PathLike::Root, &["bad\0name"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FsError>(),
            Some(FsError::InvalidPath { .. })
        ));
    }

    #[test]
    fn paths_of_different_backends_differ() -> Result<()> {
        let a = MapFS::new();
        let b = MapFS::new();
        let pa = join(&a, "/same".into(), &[])?;
        let pb = join(&b, "/same".into(), &[])?;
        assert_ne!(pa, pb);
        assert_eq!(pa.to_string(), pb.to_string());

        let err = join(&b, PathLike::Path(&pa), &["x"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FsError>(),
            Some(FsError::ForeignPath(_))
        ));
        assert!(pa.relativize(&pb).is_err());
        Ok(())
    }

    #[test]
    fn parent_and_file_name() -> Result<()> {
        let fs = MapFS::new();
        let path = join(&fs, "/a/b".into(), &[])?;
        assert_eq!(path.file_name(), Some("b"));
        let parent = path.parent().unwrap();
        assert_eq!(parent.to_string(), "/a");
        assert!(path.starts_with(&parent));

        let root = parent.parent().unwrap();
        assert!(root.is_root());
        assert_eq!(root.parent(), None);
        assert_eq!(root.file_name(), None);
        Ok(())
    }

    #[test]
    fn relativize() -> Result<()> {
        let fs = MapFS::new();
        let a = join(&fs, "/a/b".into(), &[])?;
        let same = join(&fs, "/a/b".into(), &[])?;
        let child = join(&fs, "/a/b/c".into(), &[])?;
        let root = join(&fs, PathLike::Root, &[])?;

        assert_eq!(a.relativize(&same)?, PathBuf::new());
        assert_eq!(a.relativize(&child)?, PathBuf::from("c"));
        assert_eq!(child.relativize(&root)?, PathBuf::from("../../.."));
        Ok(())
    }
}
