//! Detached element subtrees
//!
//! A `Fragment` is an owned copy of an element with its attributes and mixed
//! content. It carries markup the marking model does not interpret, so it can
//! be written back unchanged.

use serde::{Deserialize, Serialize};

use super::tree::{Child, Document};
use super::types::NodeRef;
use crate::error::Result;

/// An owned element subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    #[serde(default)]
    pub children: Vec<FragmentNode>,
}

/// Content of a fragment, in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FragmentNode {
    Text(String),
    Element(Fragment),
}

impl Fragment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element holding a single text node
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut fragment = Self::new(name);
        fragment.children.push(FragmentNode::Text(text.into()));
        fragment
    }

    /// Direct text content, concatenated
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                FragmentNode::Text(t) => Some(t.as_str()),
                FragmentNode::Element(_) => None,
            })
            .collect()
    }

    /// Copy the subtree rooted at `node`
    pub fn from_node(doc: &Document, node: NodeRef) -> Result<Self> {
        let data = doc.data(node)?;
        let mut children = Vec::with_capacity(data.children.len());
        for child in &data.children {
            children.push(match child {
                Child::Element(index) => {
                    FragmentNode::Element(Fragment::from_node(doc, doc.node_ref(*index))?)
                }
                Child::Text(text) => FragmentNode::Text(text.clone()),
            });
        }

        Ok(Self {
            name: data.name.clone(),
            attributes: data
                .attributes
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            children,
        })
    }

    /// Append a copy of this subtree as the last child of `parent`
    pub fn append_to(&self, doc: &mut Document, parent: NodeRef) -> Result<NodeRef> {
        let node = doc.append_element(parent, &self.name)?;
        for (name, value) in &self.attributes {
            doc.set_attribute(node, name, value)?;
        }
        for child in &self.children {
            match child {
                FragmentNode::Text(text) => doc.push_text(node, text.clone())?,
                FragmentNode::Element(element) => {
                    element.append_to(doc, node)?;
                }
            }
        }
        Ok(node)
    }

    /// Every element and attribute name in the subtree
    pub fn qualified_names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        names.extend(self.attributes.iter().map(|(n, _)| n.as_str()));
        for child in &self.children {
            if let FragmentNode::Element(element) = child {
                names.extend(element.qualified_names());
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_nested_subtree() {
        let mut doc = Document::new("root");
        let outer = doc.append_element(doc.root(), "x:Outer").unwrap();
        doc.set_attribute(outer, "kind", "wrapper").unwrap();
        let inner = doc.append_element(outer, "x:Inner").unwrap();
        doc.set_text(inner, "deep").unwrap();

        let fragment = Fragment::from_node(&doc, outer).unwrap();
        assert_eq!(fragment.attributes, vec![("kind".to_string(), "wrapper".to_string())]);
        assert_eq!(
            fragment.children,
            vec![FragmentNode::Element(Fragment::with_text("x:Inner", "deep"))]
        );
        assert_eq!(fragment.qualified_names(), vec!["x:Outer", "kind", "x:Inner"]);

        let mut other = Document::new("root");
        let root = other.root();
        let copy = fragment.append_to(&mut other, root).unwrap();
        assert_eq!(Fragment::from_node(&other, copy).unwrap(), fragment);
    }

    #[test]
    fn test_serde_untagged_content() {
        let fragment = Fragment::with_text("simpleMarking:Statement", "Internal use only");
        let json = serde_json::to_string(&fragment).unwrap();
        assert!(json.contains(r#""children":["Internal use only"]"#));

        let back: Fragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fragment);
        assert_eq!(back.text(), "Internal use only");
    }
}
