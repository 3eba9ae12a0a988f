//! Declarative filesystem trees.
//!
//! A tree literal is a JSON array of nodes. Each node is itself an array: a name, an optional
//! attribute object and then either child nodes or content lines.
//!
//! ```text
//! [
//!   ["src", ["main.rs", "fn main() {}"], ["empty-dir", {"type": "directory"}]],
//!   ["notes.txt"],
//!   ["main", {"type": "link", "link-to": "/project/src/main.rs"}],
//!   ["sources", {"type": "sym-link", "link-to": "/project/src"}]
//! ]
//! ```
//!
//! Link targets are paths taken from the backend root, never from the tree root.

mod builder;
mod node;

pub use builder::{
    BuildOptions, MismatchPolicy, build_tree, build_tree_from_str, build_tree_with, materialize,
};
pub use node::{NodeKind, NodeSpec, parse_nodes};
