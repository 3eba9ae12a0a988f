use std::path::{Component, Path, PathBuf};

use crate::core::Result;

/// Lexically resolves `.` and `..` and drops trailing separators.
/// `..` never climbs above the root (or above the start of a relative path).
pub fn normalize<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            _ => result.push(component),
        }
    }
    result
}

pub fn is_virtual_root<P: AsRef<Path>>(path: P) -> bool {
    let components: Vec<_> = path.as_ref().components().collect();
    components.len() == 1 && components[0] == Component::RootDir
}

/// Removes a host entry without following symlinks.
pub fn rm_on_host<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if std::fs::symlink_metadata(path)?.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
