//! Filesystem paths, queries and I/O over pluggable backends, plus a declarative tree builder
//! for test fixtures.
//!
//! ### Overview
//!
//! `vfs-tree` lets code and tests work with filesystem-like structures without caring whether
//! they live in memory or on disk. Everything goes through the `FsBackend` trait, with two
//! implementations: `MapFS` keeps the whole tree in memory and `DirFS` maps to a host directory.
//!
//! **Key ideas**:
//! - **Explicit backend**: every operation takes the backend as an argument, there is no global
//!   "current filesystem".
//! - **Scoped paths**: an `FsPath` remembers which backend it was built for and is rejected by
//!   any other one.
//! - **Confinement**: `DirFS` never touches anything outside of its root directory.
//! - **Fixtures**: `build_tree` materializes a nested literal of files, directories, hard links
//!   and symbolic links.
//!
//! ```
//! use serde_json::json;
//! use vfs_tree::ops::{LinkOption, is_file, read_all_lines};
//! use vfs_tree::{MapFS, PathLike, build_tree, join};
//!
//! let mut fs = MapFS::new();
//! build_tree(&mut fs, "/", &json!([["dir", ["hello.txt", "hello, world!"]]])).unwrap();
//!
//! let file = join(&fs, PathLike::Root, &["dir", "hello.txt"]).unwrap();
//! assert!(is_file(&fs, &file, LinkOption::Follow));
//! assert_eq!(read_all_lines(&fs, &file).unwrap(), ["hello, world!"]);
//! ```

mod core;
mod errors;
pub mod ops;
mod path;
pub mod tree;
mod vfs;

pub use crate::core::{FsBackend, FsId, Result};
pub use errors::FsError;
pub use path::{FsPath, PathLike, join};
pub use tree::{
    BuildOptions, MismatchPolicy, NodeKind, NodeSpec, build_tree, build_tree_from_str,
    build_tree_with, materialize, parse_nodes,
};
pub use vfs::{DirFS, EntryType, MapFS, Metadata};
