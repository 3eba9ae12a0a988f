use std::path::PathBuf;

use thiserror::Error;

use crate::EntryType;

/// Failures reported by backends, the facade and the tree builder.
///
/// Every fallible function of the crate returns `anyhow::Result`; a value of this type can be
/// recovered with `err.downcast_ref::<FsError>()` even after context has been attached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    /// A path string or segment could not be turned into a path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A path created by one backend was handed to another.
    #[error("{} belongs to another filesystem", .0.display())]
    ForeignPath(PathBuf),

    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{} is a directory", .0.display())]
    IsADirectory(PathBuf),

    #[error("directory {} is not empty", .0.display())]
    DirectoryNotEmpty(PathBuf),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{} is not a symbolic link", .0.display())]
    NotASymLink(PathBuf),

    /// A hard link was requested to an entry that does not exist.
    #[error("cannot link {} to missing target {}", .link.display(), .target.display())]
    TargetMissing { link: PathBuf, target: PathBuf },

    /// An entry exists at the path but has another type than requested.
    #[error("{} is a {found:?}, expected a {expected:?}", .path.display())]
    TypeMismatch {
        path: PathBuf,
        expected: EntryType,
        found: EntryType,
    },

    #[error("too many levels of symbolic links: {}", .0.display())]
    SymlinkLoop(PathBuf),

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// A tree literal does not have the shape of a node.
    #[error("malformed node {node}: {reason}")]
    MalformedNode { node: String, reason: String },

    /// The `type` attribute of a tree node is not part of the vocabulary.
    #[error("illegal type {node_type:?} for node {node}")]
    IllegalNodeType { node: String, node_type: String },

    /// A link node does not carry a `link-to` attribute.
    #[error("link {} has no link-to attribute", .0.display())]
    MissingLinkTarget(PathBuf),
}

impl FsError {
    /// True if `err` carries [`FsError::NotFound`].
    pub(crate) fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<FsError>(), Some(FsError::NotFound(_)))
    }
}
