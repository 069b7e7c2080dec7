//! Node identity types
//!
//! A `TreePosition` names an element, one of its attributes, or its text.
//! Positions are plain values: they stay comparable and hashable after the
//! node they name has been detached, but the owning `Document` refuses them.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one document instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable reference to an element node
///
/// Arena slots are never reused, so a `NodeRef` can never come to denote a
/// different element than the one it was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub(crate) doc: DocumentId,
    pub(crate) index: usize,
}

impl NodeRef {
    pub fn document(&self) -> DocumentId {
        self.doc
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.index)
    }
}

/// Something a marking can be anchored to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TreePosition {
    /// An element and, optionally, everything beneath it
    Node(NodeRef),
    /// A named attribute of an element
    Attribute { owner: NodeRef, name: String },
    /// The text content of an element
    Text(NodeRef),
}

impl TreePosition {
    pub fn attribute(owner: NodeRef, name: impl Into<String>) -> Self {
        TreePosition::Attribute {
            owner,
            name: name.into(),
        }
    }

    pub fn text(owner: NodeRef) -> Self {
        TreePosition::Text(owner)
    }

    /// The element this position belongs to
    pub fn owner(&self) -> NodeRef {
        match self {
            TreePosition::Node(node) => *node,
            TreePosition::Attribute { owner, .. } => *owner,
            TreePosition::Text(owner) => *owner,
        }
    }

    /// Attributes and text are leaves: they have no descendants
    pub fn is_leaf(&self) -> bool {
        !matches!(self, TreePosition::Node(_))
    }

    pub fn document(&self) -> DocumentId {
        self.owner().doc
    }
}

impl From<NodeRef> for TreePosition {
    fn from(node: NodeRef) -> Self {
        TreePosition::Node(node)
    }
}

impl fmt::Display for TreePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreePosition::Node(node) => write!(f, "{}", node),
            TreePosition::Attribute { owner, name } => write!(f, "{}/@{}", owner, name),
            TreePosition::Text(owner) => write!(f, "{}/text()", owner),
        }
    }
}

/// An attribute as stored on an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Split a qualified name into prefix and local part
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("stix:Indicator"), (Some("stix"), "Indicator"));
        assert_eq!(split_qname("Indicator"), (None, "Indicator"));
    }

    #[test]
    fn test_position_owner_and_leaf() {
        let node = NodeRef {
            doc: DocumentId::new(),
            index: 3,
        };
        assert!(!TreePosition::Node(node).is_leaf());
        assert!(TreePosition::text(node).is_leaf());

        let attr = TreePosition::attribute(node, "id");
        assert!(attr.is_leaf());
        assert_eq!(attr.owner(), node);
        assert_eq!(attr.to_string(), "node#3/@id");
    }
}
