use anyhow::Context;
use log::{debug, warn};
use serde_json::Value;

use crate::core::{FsBackend, Result};
use crate::ops::{
    Creation, WriteOptions, create_directories, create_directory, create_file, create_hard_link,
    create_symlink, write_lines,
};
use crate::tree::node::{NodeKind, NodeSpec, parse_nodes};
use crate::{FsError, FsPath, PathLike, join};

/// What to do when a node meets an existing entry of another kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MismatchPolicy {
    /// Abort with [`FsError::TypeMismatch`].
    #[default]
    Fail,
    /// Log a warning and skip the node together with its subtree.
    Skip,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub mismatch: MismatchPolicy,
    /// Create the root directory, with its parents, before anything else.
    pub create_root: bool,
}

/// Materializes `nodes` below `root` with default [`BuildOptions`].
///
/// The whole literal is validated first: a malformed tree leaves the backend untouched. After
/// that, nodes are created depth-first in declared order and the first failure aborts the build
/// without rolling back what was already created.
///
/// ```
/// use serde_json::json;
/// use vfs_tree::{FsBackend, MapFS, build_tree};
///
/// let mut fs = MapFS::new();
/// fs.mkdir("/fixture").unwrap();
/// build_tree(&mut fs, "/fixture", &json!([
///     ["docs", ["readme.txt", "first line", "second line"]],
///     ["latest", {"type": "sym-link", "link-to": "/fixture/docs/readme.txt"}],
/// ])).unwrap();
///
/// assert_eq!(fs.read("/fixture/latest").unwrap(), b"first line\nsecond line\n");
/// ```
pub fn build_tree<F: FsBackend>(fs: &mut F, root: &str, nodes: &Value) -> Result<()> {
    build_tree_with(fs, root, nodes, &BuildOptions::default())
}

pub fn build_tree_with<F: FsBackend>(
    fs: &mut F,
    root: &str,
    nodes: &Value,
    options: &BuildOptions,
) -> Result<()> {
    let root = join(fs, PathLike::Str(root), &[])?;
    let specs = parse_nodes(nodes, root.as_path())?;
    if options.create_root {
        create_directories(fs, &root)?;
    }
    materialize(fs, &root, &specs, options)
}

/// Same as [`build_tree`] for a tree literal written as JSON text.
pub fn build_tree_from_str<F: FsBackend>(fs: &mut F, root: &str, literal: &str) -> Result<()> {
    let nodes: Value = serde_json::from_str(literal).context("tree literal is not valid JSON")?;
    build_tree(fs, root, &nodes)
}

/// Creates already validated nodes below `root`, which must be an existing directory unless
/// `options.create_root` is set.
pub fn materialize<F: FsBackend>(
    fs: &mut F,
    root: &FsPath,
    specs: &[NodeSpec],
    options: &BuildOptions,
) -> Result<()> {
    for spec in specs {
        materialize_node(fs, root, spec, options)?;
    }
    Ok(())
}

fn materialize_node<F: FsBackend>(
    fs: &mut F,
    parent: &FsPath,
    spec: &NodeSpec,
    options: &BuildOptions,
) -> Result<()> {
    let path = parent.join(spec.name())?;
    debug!("materializing {path}");

    match spec.kind() {
        NodeKind::Directory { children } => {
            if create(fs, &path, options, create_directory)? {
                materialize(fs, &path, children, options)?;
            }
        }
        NodeKind::File { content } => {
            if create(fs, &path, options, create_file)? {
                if let Some(lines) = content.as_ref().filter(|lines| !lines.is_empty()) {
                    write_lines(fs, &path, lines, WriteOptions::default())
                        .with_context(|| format!("writing content of {path}"))?;
                }
            }
        }
        NodeKind::HardLink { target } => {
            let existing = join(fs, PathLike::Str(target), &[])?;
            create_hard_link(fs, &path, &existing)
                .with_context(|| format!("linking {path} to {existing}"))?;
        }
        NodeKind::SymLink { target } => {
            let target = join(fs, PathLike::Str(target), &[])?;
            create_symlink(fs, &path, &target)
                .with_context(|| format!("symlinking {path} to {target}"))?;
        }
    }
    Ok(())
}

/// Runs an idempotent creation. Returns `false` when the node was skipped.
fn create<F: FsBackend>(
    fs: &mut F,
    path: &FsPath,
    options: &BuildOptions,
    op: fn(&mut F, &FsPath) -> Result<Creation>,
) -> Result<bool> {
    match op(fs, path) {
        Ok(_) => Ok(true),
        Err(err) => {
            let mismatch = matches!(
                err.downcast_ref::<FsError>(),
                Some(FsError::TypeMismatch { .. })
            );
            if mismatch && options.mismatch == MismatchPolicy::Skip {
                warn!("skipping node: {err}");
                return Ok(false);
            }
            Err(err.context(format!("creating {path}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{EntryType, MapFS};

    fn fs_with_root() -> MapFS {
        let mut fs = MapFS::new();
        fs.mkdir("/root").unwrap();
        fs
    }

    fn fs_error(err: &anyhow::Error) -> &FsError {
        err.downcast_ref::<FsError>().unwrap()
    }

    fn read(fs: &MapFS, path: &str) -> String {
        String::from_utf8(fs.read(path).unwrap()).unwrap()
    }

    #[test]
    fn nested_tree() -> Result<()> {
        let mut fs = fs_with_root();
        build_tree(
            &mut fs,
            "/root",
            &json!([
                ["a", ["b", ["c", "line 1", "line 2"]], ["empty"]],
                ["d", {"type": "directory"}],
                ["hard", {"type": "link", "link-to": "/root/a/b/c"}],
                ["soft", {"type": "sym-link", "link-to": "/root/a"}]
            ]),
        )?;

        assert!(fs.metadata("/root/a/b", false)?.is_dir());
        assert!(fs.metadata("/root/d", false)?.is_dir());
        assert!(fs.metadata("/root/a/empty", false)?.is_file());
        assert_eq!(read(&fs, "/root/a/b/c"), "line 1\nline 2\n");
        assert_eq!(read(&fs, "/root/hard"), "line 1\nline 2\n");
        assert!(fs.metadata("/root/soft", false)?.is_symlink());
        assert_eq!(read(&fs, "/root/soft/b/c"), "line 1\nline 2\n");
        Ok(())
    }

    fn build_nested_scenario<F: FsBackend>(fs: &mut F) -> Result<()> {
        use crate::ops::{
            LinkOption, is_directory, is_file, is_symlink, read_all_lines, read_symlink_target,
        };

        build_tree(
            fs,
            "/",
            &json!([
                ["my",
                    ["path",
                        ["to", ["file"], ["has-content", "line 1", "line 2"]],
                        ["empty-dir", {"type": "directory"}]],
                    ["link", {"type": "sym-link", "link-to": "/my/path/to"}]],
                ["hard-link", {"type": "link", "link-to": "/my/path/to/file"}]
            ]),
        )?;

        let fs: &F = fs;
        let at = |p: &str| join(fs, PathLike::Str(p), &[]);
        for dir in ["/my", "/my/path", "/my/path/to", "/my/path/empty-dir"] {
            assert!(is_directory(fs, &at(dir)?, LinkOption::NoFollow), "{dir}");
        }
        for file in ["/my/path/to/file", "/hard-link"] {
            assert!(is_file(fs, &at(file)?, LinkOption::NoFollow), "{file}");
        }
        let link = at("/my/link")?;
        assert!(is_symlink(fs, &link));
        assert_eq!(read_symlink_target(fs, &link)?, at("/my/path/to")?);
        assert_eq!(
            read_all_lines(fs, &at("/my/path/to/has-content")?)?,
            ["line 1", "line 2"]
        );
        Ok(())
    }

    #[test]
    fn nested_scenario_in_memory() -> Result<()> {
        build_nested_scenario(&mut MapFS::new())
    }

    #[cfg(unix)]
    #[test]
    fn nested_scenario_on_host() -> Result<()> {
        let temp_dir = tempdir::TempDir::new("tree_scenario")?;
        let mut fs = crate::DirFS::new(temp_dir.path())?;
        build_nested_scenario(&mut fs)?;
        assert!(temp_dir.path().join("my/path/empty-dir").is_dir());
        Ok(())
    }

    #[test]
    fn content_round_trip() -> Result<()> {
        let mut fs = fs_with_root();
        build_tree(&mut fs, "/root", &json!([["foo", "hello, world!"]]))?;
        assert_eq!(read(&fs, "/root/foo"), "hello, world!\n");
        Ok(())
    }

    #[test]
    fn rebuild_is_idempotent_and_overwrites_content() -> Result<()> {
        let mut fs = fs_with_root();
        build_tree(&mut fs, "/root", &json!([["dir", ["file", "old", "content"]]]))?;
        build_tree(&mut fs, "/root", &json!([["dir", ["file", "new"]]]))?;

        assert_eq!(read(&fs, "/root/dir/file"), "new\n");
        assert_eq!(fs.ls("/root")?.count(), 1);
        assert_eq!(fs.ls("/root/dir")?.count(), 1);
        Ok(())
    }

    #[test]
    fn rebuild_without_content_keeps_content() -> Result<()> {
        let mut fs = fs_with_root();
        build_tree(&mut fs, "/root", &json!([["file", "kept"]]))?;
        build_tree(&mut fs, "/root", &json!([["file"]]))?;
        assert_eq!(read(&fs, "/root/file"), "kept\n");
        Ok(())
    }

    #[test]
    fn links_need_earlier_targets() -> Result<()> {
        let mut fs = fs_with_root();
        build_tree(
            &mut fs,
            "/root",
            &json!([["a"], ["l", {"type": "link", "link-to": "/root/a"}]]),
        )?;
        assert!(fs.metadata("/root/l", false)?.is_file());

        let mut fs = fs_with_root();
        let err = build_tree(
            &mut fs,
            "/root",
            &json!([["l", {"type": "link", "link-to": "/root/a"}], ["a"]]),
        )
        .unwrap_err();
        assert!(matches!(fs_error(&err), FsError::TargetMissing { .. }));
        assert!(!fs.exists("/root/a", false));
        Ok(())
    }

    #[test]
    fn symlink_may_point_at_a_later_node() -> Result<()> {
        let mut fs = fs_with_root();
        build_tree(
            &mut fs,
            "/root",
            &json!([["l", {"type": "sym-link", "link-to": "/root/a"}], ["a", "x"]]),
        )?;
        assert_eq!(read(&fs, "/root/l"), "x\n");
        Ok(())
    }

    #[test]
    fn invalid_literal_creates_nothing() {
        let mut fs = fs_with_root();
        let err = build_tree(
            &mut fs,
            "/root",
            &json!([["first"], ["dir", ["l", {"type": "sym-link"}]]]),
        )
        .unwrap_err();

        assert_eq!(
            fs_error(&err),
            &FsError::MissingLinkTarget("/root/dir/l".into())
        );
        assert!(!fs.exists("/root/first", false));
        assert!(!fs.exists("/root/dir", false));
    }

    #[test]
    fn failure_keeps_partial_tree() {
        let mut fs = fs_with_root();
        let err = build_tree(
            &mut fs,
            "/root",
            &json!([["ok", "done"], ["bad", {"type": "link", "link-to": "/nowhere"}], ["never"]]),
        )
        .unwrap_err();

        assert!(matches!(fs_error(&err), FsError::TargetMissing { .. }));
        assert!(fs.exists("/root/ok", false));
        assert!(!fs.exists("/root/never", false));
    }

    #[test]
    fn missing_root_fails() {
        let mut fs = MapFS::new();
        let err = build_tree(&mut fs, "/absent", &json!([["file"]])).unwrap_err();
        assert!(matches!(fs_error(&err), FsError::NotFound(_)));
    }

    #[test]
    fn create_root_option() -> Result<()> {
        let mut fs = MapFS::new();
        let options = BuildOptions {
            create_root: true,
            ..BuildOptions::default()
        };
        build_tree_with(&mut fs, "/deep/root", &json!([["file"]]), &options)?;
        assert!(fs.metadata("/deep/root/file", false)?.is_file());
        Ok(())
    }

    #[rstest]
    #[case::file_on_directory(json!([["entry", {"type": "file"}]]), EntryType::File)]
    #[case::directory_on_file(json!([["other", ["child"]]]), EntryType::Directory)]
    fn mismatch_fails_by_default(#[case] nodes: Value, #[case] expected: EntryType) {
        let mut fs = fs_with_root();
        fs.mkdir("/root/entry").unwrap();
        fs.mkfile("/root/other", None).unwrap();

        let err = build_tree(&mut fs, "/root", &nodes).unwrap_err();
        assert!(matches!(
            fs_error(&err),
            FsError::TypeMismatch { expected: e, .. } if *e == expected
        ));
    }

    #[test]
    fn mismatch_can_be_skipped() -> Result<()> {
        let mut fs = fs_with_root();
        fs.mkfile("/root/other", None)?;
        let options = BuildOptions {
            mismatch: MismatchPolicy::Skip,
            ..BuildOptions::default()
        };

        build_tree_with(
            &mut fs,
            "/root",
            &json!([["other", ["child"]], ["after"]]),
            &options,
        )?;
        assert!(fs.metadata("/root/other", false)?.is_file());
        assert!(!fs.exists("/root/other/child", false));
        assert!(fs.exists("/root/after", false));
        Ok(())
    }

    #[test]
    fn from_str() -> Result<()> {
        let mut fs = fs_with_root();
        build_tree_from_str(&mut fs, "/root", r#"[["dir", ["file", "text"]]]"#)?;
        assert_eq!(read(&fs, "/root/dir/file"), "text\n");

        assert!(build_tree_from_str(&mut fs, "/root", "[[").is_err());
        Ok(())
    }

    #[test]
    fn materialize_built_specs() -> Result<()> {
        let mut fs = fs_with_root();
        let root = join(&fs, PathLike::Str("/root"), &[])?;
        let specs = vec![
            NodeSpec::dir("conf", vec![NodeSpec::file("app.toml").with_lines(["a = 1"])]),
            NodeSpec::sym_link("current", "/root/conf"),
        ];
        materialize(&mut fs, &root, &specs, &BuildOptions::default())?;
        assert_eq!(read(&fs, "/root/current/app.toml"), "a = 1\n");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn builds_on_host_directory() -> Result<()> {
        use std::path::Path;

        use tempdir::TempDir;

        use crate::DirFS;

        let temp_dir = TempDir::new("tree_test")?;
        let mut fs = DirFS::new(temp_dir.path())?;
        build_tree(
            &mut fs,
            "/",
            &json!([
                ["a", ["b", "content"]],
                ["hard", {"type": "link", "link-to": "/a/b"}],
                ["soft", {"type": "sym-link", "link-to": "/a"}]
            ]),
        )?;

        let host = temp_dir.path();
        assert_eq!(std::fs::read_to_string(host.join("a/b"))?, "content\n");
        assert_eq!(std::fs::read_to_string(host.join("hard"))?, "content\n");
        assert!(std::fs::symlink_metadata(host.join("soft"))?.is_symlink());
        assert_eq!(fs.read_link("/soft")?, Path::new("/a"));
        Ok(())
    }
}
