use log::debug;

use crate::core::{FsBackend, Result};
use crate::ops::{existing_type, own, parent_must_be_dir};
use crate::{EntryType, FsError, FsPath};

/// Outcome of an idempotent creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    Created,
    AlreadyExisted,
}

/// Decides whether an entry of type `wanted` has to be created at `path`.
fn check_existing<F: FsBackend>(
    fs: &F,
    path: &FsPath,
    wanted: EntryType,
) -> Result<Option<Creation>> {
    match existing_type(fs, path) {
        None => Ok(None),
        Some(found) if found == wanted => {
            debug!("{path} already exists");
            Ok(Some(Creation::AlreadyExisted))
        }
        Some(found) => Err(FsError::TypeMismatch {
            path: path.as_path().to_path_buf(),
            expected: wanted,
            found,
        }
        .into()),
    }
}

/// Creates a directory whose parent exists. An existing directory (or a link to one) is left
/// alone and reported as [`Creation::AlreadyExisted`]; any other entry is a
/// [`FsError::TypeMismatch`].
pub fn create_directory<F: FsBackend>(fs: &mut F, path: &FsPath) -> Result<Creation> {
    own(fs, path)?;
    if let Some(existing) = check_existing(fs, path, EntryType::Directory)? {
        return Ok(existing);
    }
    parent_must_be_dir(fs, path)?;
    fs.mkdir(path)?;
    Ok(Creation::Created)
}

/// Creates a directory together with its missing parents.
pub fn create_directories<F: FsBackend>(fs: &mut F, path: &FsPath) -> Result<Creation> {
    own(fs, path)?;
    if let Some(existing) = check_existing(fs, path, EntryType::Directory)? {
        return Ok(existing);
    }
    fs.mkdir(path)?;
    Ok(Creation::Created)
}

/// Creates an empty file whose parent exists. Same idempotence rules as [`create_directory`].
pub fn create_file<F: FsBackend>(fs: &mut F, path: &FsPath) -> Result<Creation> {
    own(fs, path)?;
    if let Some(existing) = check_existing(fs, path, EntryType::File)? {
        return Ok(existing);
    }
    parent_must_be_dir(fs, path)?;
    fs.mkfile(path, None)?;
    Ok(Creation::Created)
}

/// Creates `link` as another name of `existing`. Fails with [`FsError::TargetMissing`] if
/// `existing` does not exist.
pub fn create_hard_link<F: FsBackend>(fs: &mut F, link: &FsPath, existing: &FsPath) -> Result<()> {
    own(fs, link)?;
    own(fs, existing)?;
    fs.hard_link(link, existing)
}

/// Creates `link` pointing at `target`. The target does not have to exist.
pub fn create_symlink<F: FsBackend>(fs: &mut F, link: &FsPath, target: &FsPath) -> Result<()> {
    own(fs, link)?;
    own(fs, target)?;
    fs.symlink(link, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapFS, PathLike, join};

    fn path(fs: &MapFS, p: &str) -> FsPath {
        join(fs, PathLike::Str(p), &[]).unwrap()
    }

    fn fs_error(err: &anyhow::Error) -> &FsError {
        err.downcast_ref::<FsError>().unwrap()
    }

    #[test]
    fn create_directory_is_idempotent() -> Result<()> {
        let mut fs = MapFS::new();
        let dir = path(&fs, "/dir");

        assert_eq!(create_directory(&mut fs, &dir)?, Creation::Created);
        assert_eq!(create_directory(&mut fs, &dir)?, Creation::AlreadyExisted);
        assert_eq!(fs.ls("/")?.count(), 1);
        Ok(())
    }

    #[test]
    fn create_file_is_idempotent() -> Result<()> {
        let mut fs = MapFS::new();
        let file = path(&fs, "/file");

        assert_eq!(create_file(&mut fs, &file)?, Creation::Created);
        fs.write("/file", b"keep")?;
        assert_eq!(create_file(&mut fs, &file)?, Creation::AlreadyExisted);
        assert_eq!(fs.read("/file")?, b"keep");
        assert_eq!(fs.ls("/")?.count(), 1);
        Ok(())
    }

    #[test]
    fn create_requires_parent() {
        let mut fs = MapFS::new();
        let nested = path(&fs, "/missing/child");

        let err = create_directory(&mut fs, &nested).unwrap_err();
        assert!(matches!(
            fs_error(&err),
            FsError::NotFound(p) if p.as_path() == std::path::Path::new("/missing")
        ));
        assert!(create_file(&mut fs, &nested).is_err());
        assert!(!fs.exists("/missing", false));
    }

    #[test]
    fn create_directories_creates_parents() -> Result<()> {
        let mut fs = MapFS::new();
        let nested = path(&fs, "/a/b/c");
        assert_eq!(create_directories(&mut fs, &nested)?, Creation::Created);
        assert_eq!(create_directories(&mut fs, &nested)?, Creation::AlreadyExisted);
        assert!(fs.metadata("/a/b", false)?.is_dir());
        Ok(())
    }

    #[test]
    fn type_mismatch_is_reported() -> Result<()> {
        let mut fs = MapFS::new();
        let entry = path(&fs, "/entry");
        create_directory(&mut fs, &entry)?;

        let err = create_file(&mut fs, &entry).unwrap_err();
        assert_eq!(
            fs_error(&err),
            &FsError::TypeMismatch {
                path: "/entry".into(),
                expected: EntryType::File,
                found: EntryType::Directory,
            }
        );
        Ok(())
    }

    #[test]
    fn link_to_directory_counts_as_directory() -> Result<()> {
        let mut fs = MapFS::new();
        fs.mkdir("/real")?;
        fs.symlink("/alias", "/real")?;
        let alias = path(&fs, "/alias");
        assert_eq!(create_directory(&mut fs, &alias)?, Creation::AlreadyExisted);
        Ok(())
    }

    #[test]
    fn hard_link_needs_target() -> Result<()> {
        let mut fs = MapFS::new();
        let link = path(&fs, "/link");
        let target = path(&fs, "/target");

        let err = create_hard_link(&mut fs, &link, &target).unwrap_err();
        assert!(matches!(fs_error(&err), FsError::TargetMissing { .. }));

        create_file(&mut fs, &target)?;
        create_hard_link(&mut fs, &link, &target)?;
        assert!(fs.metadata("/link", false)?.is_file());
        Ok(())
    }

    #[test]
    fn symlink_may_dangle() -> Result<()> {
        let mut fs = MapFS::new();
        let link = path(&fs, "/link");
        let target = path(&fs, "/later");

        create_symlink(&mut fs, &link, &target)?;
        assert!(fs.exists("/link", false));
        assert!(!fs.exists("/link", true));
        Ok(())
    }
}
