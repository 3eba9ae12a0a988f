use std::path::PathBuf;

use glob::Pattern;
use log::trace;

use crate::core::{FsBackend, FsId, Result};
use crate::ops::own;
use crate::{FsError, FsPath};

/// Lazy listing of one directory, optionally filtered by a shell glob on entry names.
///
/// The stream owns whatever the backend needs to enumerate the directory (a host directory
/// handle for `DirFS`); it is released when the stream is dropped, whether iteration ran to
/// the end, stopped early or hit an error.
pub struct DirStream<'a> {
    fs: FsId,
    dir: FsPath,
    pattern: Option<Pattern>,
    entries: Box<dyn Iterator<Item = Result<PathBuf>> + 'a>,
}

impl Iterator for DirStream<'_> {
    type Item = Result<FsPath>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            let matches = match &self.pattern {
                Some(pattern) => entry
                    .file_name()
                    .is_some_and(|name| pattern.matches(&name.to_string_lossy())),
                None => true,
            };
            if matches {
                return Some(Ok(FsPath::from_inner(self.fs, entry)));
            }
        }
    }
}

impl Drop for DirStream<'_> {
    fn drop(&mut self) {
        trace!("closing directory stream {}", self.dir);
    }
}

/// Lists the entries of the directory `path` in backend order.
///
/// ```
/// use vfs_tree::{FsBackend, MapFS, PathLike, join};
/// use vfs_tree::ops::list_directory;
///
/// let mut fs = MapFS::new();
/// fs.mkfile("/dir/matches", None).unwrap();
/// fs.mkfile("/dir/dont-match", None).unwrap();
///
/// let dir = join(&fs, PathLike::Root, &["dir"]).unwrap();
/// let names: Vec<String> = list_directory(&fs, &dir, Some("mat*"))
///     .unwrap()
///     .map(|p| p.unwrap().file_name().unwrap().to_string())
///     .collect();
/// assert_eq!(names, ["matches"]);
/// ```
pub fn list_directory<'a, F: FsBackend>(
    fs: &'a F,
    path: &FsPath,
    glob: Option<&str>,
) -> Result<DirStream<'a>> {
    own(fs, path)?;
    let pattern = glob
        .map(|g| {
            Pattern::new(g).map_err(|e| FsError::InvalidGlob {
                pattern: g.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()?;
    let entries = fs.ls(path.as_path().to_path_buf())?;
    trace!("opened directory stream {path}");
    Ok(DirStream {
        fs: fs.id(),
        dir: path.clone(),
        pattern,
        entries: Box::new(entries),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{MapFS, PathLike, join};

    fn setup() -> (MapFS, FsPath) {
        let mut fs = MapFS::new();
        for name in ["matches", "dont-match", "match.txt", ".hidden"] {
            fs.mkfile(format!("/dir/{name}"), None).unwrap();
        }
        fs.mkdir("/dir/sub/deeper").unwrap();
        let dir = join(&fs, PathLike::Root, &["dir"]).unwrap();
        (fs, dir)
    }

    fn names(stream: DirStream<'_>) -> Vec<String> {
        let mut names: Vec<String> = stream
            .map(|p| p.unwrap().file_name().unwrap().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn lists_immediate_children() -> Result<()> {
        let (fs, dir) = setup();
        assert_eq!(
            names(list_directory(&fs, &dir, None)?),
            vec![".hidden", "dont-match", "match.txt", "matches", "sub"]
        );
        Ok(())
    }

    #[rstest]
    #[case("mat*", &["match.txt", "matches"])]
    #[case("matches", &["matches"])]
    #[case("*.txt", &["match.txt"])]
    #[case("?ont-*", &["dont-match"])]
    #[case("[ds]*", &["dont-match", "sub"])]
    #[case("nothing*", &[])]
    fn glob_filter(#[case] glob: &str, #[case] expected: &[&str]) -> Result<()> {
        let (fs, dir) = setup();
        assert_eq!(names(list_directory(&fs, &dir, Some(glob))?), expected);
        Ok(())
    }

    #[test]
    fn entries_belong_to_the_backend() -> Result<()> {
        let (fs, dir) = setup();
        for entry in list_directory(&fs, &dir, None)? {
            let entry = entry?;
            assert_eq!(entry.fs_id(), fs.id());
            assert_eq!(entry.parent().as_ref(), Some(&dir));
        }
        Ok(())
    }

    #[test]
    fn early_stop() -> Result<()> {
        let (fs, dir) = setup();
        let first = list_directory(&fs, &dir, None)?.next();
        assert!(first.is_some());
        Ok(())
    }

    #[test]
    fn invalid_glob() {
        let (fs, dir) = setup();
        let err = list_directory(&fs, &dir, Some("[")).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<FsError>(),
            Some(FsError::InvalidGlob { .. })
        ));
    }

    #[test]
    fn listing_a_file_fails() {
        let (fs, _) = setup();
        let file = join(&fs, "/dir/matches".into(), &[]).unwrap();
        assert!(list_directory(&fs, &file, None).is_err());
    }
}
