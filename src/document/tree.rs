//! Arena-backed element tree
//!
//! Elements live in a flat arena indexed by `NodeRef`. Detaching a subtree
//! only unlinks it and flags its slots dead; slots are never reused.

use serde_json::{json, Map, Value};
use std::fmt::Display;

use super::types::{split_qname, Attribute, DocumentId, NodeRef, TreePosition};
use crate::error::{MarkingError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Child {
    Element(usize),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) name: String,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) children: Vec<Child>,
    pub(crate) parent: Option<usize>,
    live: bool,
}

impl NodeData {
    fn new(name: &str, parent: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent,
            live: true,
        }
    }
}

/// An XML-like document tree
///
/// Cloning a document keeps its identity: a clone is a snapshot in which every
/// existing `NodeRef` still denotes the corresponding element.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    nodes: Vec<NodeData>,
}

impl Document {
    /// Create a document with a single root element
    pub fn new(root_name: &str) -> Self {
        Self {
            id: DocumentId::new(),
            nodes: vec![NodeData::new(root_name, None)],
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn root(&self) -> NodeRef {
        self.node_ref(0)
    }

    pub(crate) fn node_ref(&self, index: usize) -> NodeRef {
        NodeRef {
            doc: self.id,
            index,
        }
    }

    pub(crate) fn data(&self, node: NodeRef) -> Result<&NodeData> {
        if node.doc != self.id {
            return Err(MarkingError::InvalidTarget(format!(
                "{} belongs to document {}, not {}",
                node, node.doc, self.id
            )));
        }
        match self.nodes.get(node.index) {
            Some(data) if data.live => Ok(data),
            Some(_) => Err(MarkingError::InvalidReference(format!(
                "{} has been detached",
                node
            ))),
            None => Err(MarkingError::InvalidReference(format!(
                "{} does not exist",
                node
            ))),
        }
    }

    fn data_mut(&mut self, node: NodeRef) -> Result<&mut NodeData> {
        self.data(node)?;
        Ok(&mut self.nodes[node.index])
    }

    pub fn is_live(&self, node: NodeRef) -> bool {
        self.data(node).is_ok()
    }

    /// Qualified element name, as written in the source
    pub fn name(&self, node: NodeRef) -> Result<&str> {
        Ok(&self.data(node)?.name)
    }

    pub fn local_name(&self, node: NodeRef) -> Result<&str> {
        Ok(split_qname(self.name(node)?).1)
    }

    pub fn prefix(&self, node: NodeRef) -> Result<Option<&str>> {
        Ok(split_qname(self.name(node)?).0)
    }

    pub fn parent(&self, node: NodeRef) -> Result<Option<NodeRef>> {
        Ok(self.data(node)?.parent.map(|p| self.node_ref(p)))
    }

    /// Element children in document order
    pub fn children(&self, node: NodeRef) -> Result<Vec<NodeRef>> {
        Ok(self
            .data(node)?
            .children
            .iter()
            .filter_map(|c| match c {
                Child::Element(i) => Some(self.node_ref(*i)),
                Child::Text(_) => None,
            })
            .collect())
    }

    pub fn attributes(&self, node: NodeRef) -> Result<&[Attribute]> {
        Ok(&self.data(node)?.attributes)
    }

    pub fn attribute(&self, node: NodeRef, name: &str) -> Result<Option<&str>> {
        Ok(self
            .data(node)?
            .attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str()))
    }

    /// First text child of an element
    pub fn text(&self, node: NodeRef) -> Result<Option<&str>> {
        Ok(self.data(node)?.children.iter().find_map(|c| match c {
            Child::Text(t) => Some(t.as_str()),
            Child::Element(_) => None,
        }))
    }

    /// Append a new element as the last child of `parent`
    pub fn append_element(&mut self, parent: NodeRef, name: &str) -> Result<NodeRef> {
        let count = self.data(parent)?.children.len();
        self.insert_element(parent, count, name)
    }

    /// Insert a new element at `index` in the child list of `parent`
    pub fn insert_element(&mut self, parent: NodeRef, index: usize, name: &str) -> Result<NodeRef> {
        self.data(parent)?;
        let slot = self.nodes.len();
        self.nodes.push(NodeData::new(name, Some(parent.index)));

        let children = &mut self.nodes[parent.index].children;
        let index = index.min(children.len());
        children.insert(index, Child::Element(slot));

        Ok(self.node_ref(slot))
    }

    /// Set or replace an attribute value
    pub fn set_attribute(&mut self, node: NodeRef, name: &str, value: impl Display) -> Result<()> {
        let value = value.to_string();
        let data = self.data_mut(node)?;
        match data.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => data.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
        Ok(())
    }

    /// Replace the first text child, or append one
    pub fn set_text(&mut self, node: NodeRef, value: impl Display) -> Result<()> {
        let value = value.to_string();
        let data = self.data_mut(node)?;
        match data.children.iter_mut().find(|c| matches!(c, Child::Text(_))) {
            Some(child) => *child = Child::Text(value),
            None => data.children.push(Child::Text(value)),
        }
        Ok(())
    }

    pub(crate) fn push_text(&mut self, node: NodeRef, value: String) -> Result<()> {
        self.data_mut(node)?.children.push(Child::Text(value));
        Ok(())
    }

    /// Unlink a subtree; every element in it becomes an invalid reference
    pub fn detach(&mut self, node: NodeRef) -> Result<()> {
        let parent = match self.data(node)?.parent {
            Some(parent) => parent,
            None => {
                return Err(MarkingError::InvalidTarget(
                    "the document root cannot be detached".to_string(),
                ))
            }
        };

        let mut doomed = vec![node];
        doomed.extend(self.descendants(node)?);

        self.nodes[parent]
            .children
            .retain(|c| *c != Child::Element(node.index));
        for n in doomed {
            self.nodes[n.index].live = false;
        }

        Ok(())
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, node: NodeRef) -> Result<Vec<NodeRef>> {
        let mut out = Vec::new();
        let mut current = self.data(node)?.parent;
        while let Some(index) = current {
            out.push(self.node_ref(index));
            current = self.nodes[index].parent;
        }
        Ok(out)
    }

    /// All elements beneath `node` in document order
    pub fn descendants(&self, node: NodeRef) -> Result<Vec<NodeRef>> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeRef> = self.children(node)?.into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current)?.into_iter().rev());
        }
        Ok(out)
    }

    /// Every live element, root first, in document order
    pub fn walk(&self) -> Vec<NodeRef> {
        let root = self.root();
        let mut out = vec![root];
        out.extend(self.descendants(root).unwrap_or_default());
        out
    }

    pub fn depth(&self, node: NodeRef) -> Result<usize> {
        Ok(self.ancestors(node)?.len())
    }

    /// True if `ancestor` is `node` or one of its ancestors
    pub fn contains(&self, ancestor: NodeRef, node: NodeRef) -> Result<bool> {
        if ancestor == node {
            return Ok(true);
        }
        Ok(self.ancestors(node)?.contains(&ancestor))
    }

    /// Nearest element that is an ancestor-or-self of both nodes
    pub fn common_ancestor(&self, a: NodeRef, b: NodeRef) -> Result<NodeRef> {
        let mut chain_a = vec![a];
        chain_a.extend(self.ancestors(a)?);

        let mut chain_b = vec![b];
        chain_b.extend(self.ancestors(b)?);

        chain_a
            .into_iter()
            .find(|n| chain_b.contains(n))
            .ok_or_else(|| MarkingError::InvalidReference(format!("{} and {} share no ancestor", a, b)))
    }

    /// Resolve the namespace bound to `prefix` at `node`, if declared
    pub fn namespace_uri(&self, node: NodeRef, prefix: Option<&str>) -> Result<Option<String>> {
        let attr_name = match prefix {
            Some(p) => format!("xmlns:{}", p),
            None => "xmlns".to_string(),
        };

        let mut chain = vec![node];
        chain.extend(self.ancestors(node)?);
        for n in chain {
            if let Some(uri) = self.attribute(n, &attr_name)? {
                return Ok(Some(uri.to_string()));
            }
        }
        Ok(None)
    }

    /// Namespace key and local name used to compare element names.
    ///
    /// The key is the bound namespace URI, or the literal prefix when the
    /// prefix is not declared anywhere in scope.
    pub(crate) fn name_key(&self, scope: NodeRef, qname: &str) -> Result<(String, String)> {
        let (prefix, local) = split_qname(qname);
        let key = match self.namespace_uri(scope, prefix)? {
            Some(uri) => uri,
            None => format!("#{}", prefix.unwrap_or_default()),
        };
        Ok((key, local.to_string()))
    }

    /// 1-based position of `node` among its same-named element siblings
    pub fn sibling_position(&self, node: NodeRef) -> Result<usize> {
        let parent = match self.parent(node)? {
            Some(parent) => parent,
            None => return Ok(1),
        };
        let key = self.name_key(node, self.name(node)?)?;

        let mut position = 0;
        for sibling in self.children(parent)? {
            if self.name_key(sibling, self.name(sibling)?)? == key {
                position += 1;
            }
            if sibling == node {
                break;
            }
        }
        Ok(position)
    }

    /// Verify that a position denotes something live in this document
    pub fn check(&self, position: &TreePosition) -> Result<()> {
        match position {
            TreePosition::Node(node) => self.data(*node).map(|_| ()),
            TreePosition::Attribute { owner, name } => match self.attribute(*owner, name)? {
                Some(_) => Ok(()),
                None => Err(MarkingError::InvalidReference(format!(
                    "{} has no attribute '{}'",
                    owner, name
                ))),
            },
            TreePosition::Text(owner) => match self.text(*owner)? {
                Some(_) => Ok(()),
                None => Err(MarkingError::InvalidReference(format!("{} has no text", owner))),
            },
        }
    }

    /// Raw value of an attribute or text leaf
    pub fn leaf_value(&self, position: &TreePosition) -> Result<&str> {
        let value = match position {
            TreePosition::Node(node) => {
                return Err(MarkingError::InvalidTarget(format!("{} is not a leaf value", node)))
            }
            TreePosition::Attribute { owner, name } => self.attribute(*owner, name)?,
            TreePosition::Text(owner) => self.text(*owner)?,
        };
        value.ok_or_else(|| MarkingError::InvalidReference(format!("{} has no value", position)))
    }

    /// Overwrite an attribute or text leaf
    pub fn set_value(&mut self, position: &TreePosition, value: impl Display) -> Result<()> {
        match position {
            TreePosition::Node(node) => {
                Err(MarkingError::InvalidTarget(format!("{} is not a leaf value", node)))
            }
            TreePosition::Attribute { owner, name } => self.set_attribute(*owner, name, value),
            TreePosition::Text(owner) => self.set_text(*owner, value),
        }
    }

    /// Declare `xmlns:prefix` on the root unless it is already there
    pub fn declare_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        let root = self.root();
        let attr_name = format!("xmlns:{}", prefix);
        if self.attribute(root, &attr_name)?.is_none() {
            self.set_attribute(root, &attr_name, uri)?;
        }
        Ok(())
    }

    /// JSON view of the tree: `name`, `attributes` and `children`
    pub fn to_json(&self) -> Value {
        self.element_json(0)
    }

    fn element_json(&self, index: usize) -> Value {
        let data = &self.nodes[index];
        let attributes: Map<String, Value> = data
            .attributes
            .iter()
            .map(|a| (a.name.clone(), Value::String(a.value.clone())))
            .collect();
        let children: Vec<Value> = data
            .children
            .iter()
            .map(|c| match c {
                Child::Element(i) => self.element_json(*i),
                Child::Text(t) => Value::String(t.clone()),
            })
            .collect();

        json!({
            "name": data.name,
            "attributes": attributes,
            "children": children,
        })
    }
}
