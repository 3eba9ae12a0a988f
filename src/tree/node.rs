use std::path::Path;

use log::warn;
use serde_json::{Map, Value};

use crate::FsError;
use crate::core::Result;

const TYPE_KEY: &str = "type";
const LINK_TO_KEY: &str = "link-to";

/// What a node materializes as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A regular file; `content` lines are written one per line when present.
    File { content: Option<Vec<String>> },
    Directory { children: Vec<NodeSpec> },
    /// A hard link to `target`, a path taken from the backend root.
    HardLink { target: String },
    /// A symbolic link to `target`, a path taken from the backend root.
    SymLink { target: String },
}

/// One validated entry of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    name: String,
    kind: NodeKind,
}

impl NodeSpec {
    pub fn file(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::File { content: None },
        }
    }

    pub fn dir(name: &str, children: Vec<NodeSpec>) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Directory { children },
        }
    }

    pub fn hard_link(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::HardLink {
                target: target.to_string(),
            },
        }
    }

    pub fn sym_link(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::SymLink {
                target: target.to_string(),
            },
        }
    }

    /// Sets the content of a file node. Other kinds are returned unchanged.
    pub fn with_lines<I>(mut self, lines: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        if let NodeKind::File { content } = &mut self.kind {
            *content = Some(lines.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }
}

/// Parses a tree literal: an array of node literals
/// `[name, {"type": ..., "link-to": ...}?, rest...]`.
///
/// `rest` holds either child node literals or content strings. Without a `type`, a node with
/// children is a directory and anything else is a file. The type vocabulary is `file`,
/// `directory`, `link` (hard link) and `sym-link`.
///
/// `root` only serves diagnostics: errors name nodes by the path they would be created at.
pub fn parse_nodes(nodes: &Value, root: &Path) -> Result<Vec<NodeSpec>> {
    let Value::Array(literals) = nodes else {
        return Err(malformed(root.display(), "a tree must be an array of nodes"));
    };
    literals
        .iter()
        .map(|literal| parse_node(literal, root))
        .collect()
}

fn malformed(node: impl ToString, reason: &str) -> anyhow::Error {
    FsError::MalformedNode {
        node: node.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn parse_node(literal: &Value, parent: &Path) -> Result<NodeSpec> {
    let Value::Array(parts) = literal else {
        return Err(malformed(literal, "a node must be an array"));
    };
    let (name, rest) = match parts.split_first() {
        Some((Value::String(name), rest)) => (name.as_str(), rest),
        _ => return Err(malformed(literal, "missing name")),
    };
    check_name(name, literal)?;
    let location = parent.join(name);

    let (attrs, rest) = match rest.split_first() {
        Some((Value::Object(attrs), rest)) => (Some(attrs), rest),
        _ => (None, rest),
    };
    let node_type = attrs.map(|a| node_type(a, name)).transpose()?.flatten();
    let link_to = attrs.map(|a| link_to(a, name)).transpose()?.flatten();

    let mut children = Vec::new();
    let mut lines = Vec::new();
    for part in rest {
        match part {
            Value::Array(_) => children.push(part),
            Value::String(line) => lines.push(line.clone()),
            _ => return Err(malformed(name, "expected child nodes or content lines")),
        }
    }
    if !children.is_empty() && !lines.is_empty() {
        return Err(malformed(name, "mixes child nodes and content lines"));
    }

    let node_type = match node_type {
        Some(explicit) => explicit,
        None if !children.is_empty() => "directory",
        None => "file",
    };
    let kind = match node_type {
        "directory" => {
            if !lines.is_empty() {
                return Err(malformed(name, "a directory cannot have content"));
            }
            if link_to.is_some() {
                return Err(malformed(name, "only links take link-to"));
            }
            let children = children
                .into_iter()
                .map(|child| parse_node(child, &location))
                .collect::<Result<_>>()?;
            NodeKind::Directory { children }
        }
        "file" => {
            if !children.is_empty() {
                return Err(malformed(name, "a file cannot have children"));
            }
            if link_to.is_some() {
                return Err(malformed(name, "only links take link-to"));
            }
            let content = (!lines.is_empty()).then_some(lines);
            NodeKind::File { content }
        }
        "link" | "sym-link" => {
            if !children.is_empty() || !lines.is_empty() {
                return Err(malformed(name, "a link cannot have children or content"));
            }
            let target = link_to
                .ok_or_else(|| FsError::MissingLinkTarget(location.clone()))?
                .to_string();
            if node_type == "link" {
                NodeKind::HardLink { target }
            } else {
                NodeKind::SymLink { target }
            }
        }
        other => {
            return Err(FsError::IllegalNodeType {
                node: name.to_string(),
                node_type: other.to_string(),
            }
            .into());
        }
    };

    Ok(NodeSpec {
        name: name.to_string(),
        kind,
    })
}

fn check_name(name: &str, literal: &Value) -> Result<()> {
    if name.is_empty() {
        return Err(malformed(literal, "missing name"));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(malformed(name, "a name must be a single path segment"));
    }
    Ok(())
}

fn node_type<'a>(attrs: &'a Map<String, Value>, name: &str) -> Result<Option<&'a str>> {
    for key in attrs.keys() {
        if key != TYPE_KEY && key != LINK_TO_KEY {
            warn!("node {name}: ignoring unknown attribute {key:?}");
        }
    }
    match attrs.get(TYPE_KEY) {
        None => Ok(None),
        Some(Value::String(node_type)) => Ok(Some(node_type.as_str())),
        Some(other) => Err(FsError::IllegalNodeType {
            node: name.to_string(),
            node_type: other.to_string(),
        }
        .into()),
    }
}

fn link_to<'a>(attrs: &'a Map<String, Value>, name: &str) -> Result<Option<&'a str>> {
    match attrs.get(LINK_TO_KEY) {
        None => Ok(None),
        Some(Value::String(target)) => Ok(Some(target.as_str())),
        Some(_) => Err(malformed(name, "link-to must be a string")),
    }
}
