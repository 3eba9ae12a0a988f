use anyhow::Context;

use crate::core::{FsBackend, Result};
use crate::ops::{existing_type, own, parent_must_be_dir};
use crate::{EntryType, FsError, FsPath};

/// How [`write_bytes`] and [`write_lines`] open their file.
///
/// The default creates a missing file and truncates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create the file if it is missing.
    pub create: bool,
    /// Fail with `AlreadyExists` if the file is present.
    pub create_new: bool,
    /// Add to the end instead of truncating.
    pub append: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            create: true,
            create_new: false,
            append: false,
        }
    }
}

impl WriteOptions {
    pub fn append() -> Self {
        Self {
            append: true,
            ..Self::default()
        }
    }

    pub fn create_new() -> Self {
        Self {
            create_new: true,
            ..Self::default()
        }
    }
}

pub fn write_bytes<F: FsBackend>(
    fs: &mut F,
    path: &FsPath,
    bytes: &[u8],
    options: WriteOptions,
) -> Result<FsPath> {
    own(fs, path)?;
    match existing_type(fs, path) {
        Some(EntryType::Directory) => {
            return Err(FsError::IsADirectory(path.as_path().to_path_buf()).into());
        }
        Some(_) if options.create_new => {
            return Err(FsError::AlreadyExists(path.as_path().to_path_buf()).into());
        }
        Some(_) if options.append => fs.append(path, bytes)?,
        Some(_) => fs.write(path, bytes)?,
        None if !options.create && !options.create_new => {
            return Err(FsError::NotFound(path.as_path().to_path_buf()).into());
        }
        None => {
            parent_must_be_dir(fs, path)?;
            fs.mkfile(path, Some(bytes))?;
        }
    }
    Ok(path.clone())
}

/// Writes every string followed by a newline.
///
/// ```
/// use vfs_tree::{MapFS, PathLike, join};
/// use vfs_tree::ops::{WriteOptions, read_all_lines, write_lines};
///
/// let mut fs = MapFS::new();
/// let file = join(&fs, PathLike::Root, &["notes"]).unwrap();
/// write_lines(&mut fs, &file, ["one", "two"], WriteOptions::default()).unwrap();
/// assert_eq!(read_all_lines(&fs, &file).unwrap(), ["one", "two"]);
/// ```
pub fn write_lines<F, I>(
    fs: &mut F,
    path: &FsPath,
    lines: I,
    options: WriteOptions,
) -> Result<FsPath>
where
    F: FsBackend,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    write_bytes(fs, path, text.as_bytes(), options)
}

pub fn read_bytes<F: FsBackend>(fs: &F, path: &FsPath) -> Result<Vec<u8>> {
    own(fs, path)?;
    fs.read(path)
}

pub fn read_to_string<F: FsBackend>(fs: &F, path: &FsPath) -> Result<String> {
    let bytes = read_bytes(fs, path)?;
    String::from_utf8(bytes).with_context(|| format!("{path} is not valid UTF-8"))
}

/// Reads a text file split into lines, without line terminators.
pub fn read_all_lines<F: FsBackend>(fs: &F, path: &FsPath) -> Result<Vec<String>> {
    Ok(read_to_string(fs, path)?
        .lines()
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapFS, PathLike, join};

    fn setup() -> (MapFS, FsPath) {
        let fs = MapFS::new();
        let file = join(&fs, PathLike::Root, &["file.txt"]).unwrap();
        (fs, file)
    }

    #[test]
    fn write_lines_creates_and_truncates() -> Result<()> {
        let (mut fs, file) = setup();

        write_lines(&mut fs, &file, ["line 1", "line 2"], WriteOptions::default())?;
        assert_eq!(fs.read("/file.txt")?, b"line 1\nline 2\n");

        write_lines(&mut fs, &file, ["short"], WriteOptions::default())?;
        assert_eq!(read_all_lines(&fs, &file)?, vec!["short"]);
        Ok(())
    }

    #[test]
    fn write_lines_append() -> Result<()> {
        let (mut fs, file) = setup();
        write_lines(&mut fs, &file, ["a"], WriteOptions::default())?;
        write_lines(&mut fs, &file, vec!["b".to_string()], WriteOptions::append())?;
        assert_eq!(read_all_lines(&fs, &file)?, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn write_without_create_needs_file() {
        let (mut fs, file) = setup();
        let options = WriteOptions {
            create: false,
            ..WriteOptions::default()
        };
        let err = write_bytes(&mut fs, &file, b"x", options).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FsError>(),
            Some(FsError::NotFound(_))
        ));
    }

    #[test]
    fn create_new_refuses_existing() -> Result<()> {
        let (mut fs, file) = setup();
        write_bytes(&mut fs, &file, b"first", WriteOptions::create_new())?;
        let err = write_bytes(&mut fs, &file, b"second", WriteOptions::create_new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FsError>(),
            Some(FsError::AlreadyExists(_))
        ));
        assert_eq!(read_bytes(&fs, &file)?, b"first");
        Ok(())
    }

    #[test]
    fn write_to_directory_fails() -> Result<()> {
        let (mut fs, _) = setup();
        fs.mkdir("/dir")?;
        let dir = join(&fs, "/dir".into(), &[])?;
        let err = write_lines(&mut fs, &dir, ["x"], WriteOptions::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FsError>(),
            Some(FsError::IsADirectory(_))
        ));
        Ok(())
    }

    #[test]
    fn write_needs_parent() {
        let mut fs = MapFS::new();
        let file = join(&fs, "/no/such/dir/file".into(), &[]).unwrap();
        assert!(write_lines(&mut fs, &file, ["x"], WriteOptions::default()).is_err());
        assert!(!fs.exists("/no", false));
    }

    #[test]
    fn write_through_symlink() -> Result<()> {
        let (mut fs, file) = setup();
        fs.mkfile("/file.txt", None)?;
        fs.symlink("/alias", "/file.txt")?;
        let alias = join(&fs, "/alias".into(), &[])?;

        write_lines(&mut fs, &alias, ["via link"], WriteOptions::default())?;
        assert_eq!(read_all_lines(&fs, &file)?, vec!["via link"]);
        Ok(())
    }

    #[test]
    fn read_crlf_lines() -> Result<()> {
        let (mut fs, file) = setup();
        write_bytes(&mut fs, &file, b"a\r\nb\r\n", WriteOptions::default())?;
        assert_eq!(read_all_lines(&fs, &file)?, vec!["a", "b"]);
        Ok(())
    }

    #[test]
    fn invalid_utf8() -> Result<()> {
        let (mut fs, file) = setup();
        write_bytes(&mut fs, &file, &[0xff, 0xfe], WriteOptions::default())?;
        assert!(read_to_string(&fs, &file).is_err());
        Ok(())
    }
}
