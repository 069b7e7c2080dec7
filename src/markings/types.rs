//! Marking data model
//!
//! A `MarkingSpecification` carries one or more opaque marking structures.
//! Its controlled structure is filled in only when an annotation block is
//! written; callers always supply it empty.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::{Fragment, TreePosition};

/// Traffic Light Protocol colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TlpColor {
    White,
    Green,
    Amber,
    Red,
}

impl fmt::Display for TlpColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TlpColor::White => "WHITE",
            TlpColor::Green => "GREEN",
            TlpColor::Amber => "AMBER",
            TlpColor::Red => "RED",
        };
        write!(f, "{}", name)
    }
}

/// One classification payload, written as a `Marking_Structure` element
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarkingStructure {
    /// Value of `xsi:type`, e.g. `tlpMarking:TLPMarkingStructureType`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsi_type: Option<String>,
    /// Attributes other than `xsi:type`, in document order
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    /// Child elements, kept with their full content
    #[serde(default)]
    pub elements: Vec<Fragment>,
}

impl MarkingStructure {
    pub fn tlp(color: TlpColor) -> Self {
        Self {
            xsi_type: Some("tlpMarking:TLPMarkingStructureType".to_string()),
            attributes: vec![("color".to_string(), color.to_string())],
            elements: Vec::new(),
        }
    }

    pub fn simple(statement: &str) -> Self {
        Self {
            xsi_type: Some("simpleMarking:SimpleMarkingStructureType".to_string()),
            attributes: Vec::new(),
            elements: vec![Fragment::with_text("simpleMarking:Statement", statement)],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// TLP color, if this is a TLP structure
    pub fn color(&self) -> Option<&str> {
        self.attribute("color")
    }

    /// Text of the first child element named `name`
    pub fn element_text(&self, name: &str) -> Option<String> {
        self.elements.iter().find(|e| e.name == name).map(Fragment::text)
    }
}

/// A marking: metadata plus its structures
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarkingSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Path expression, set only on materialized copies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controlled_structure: Option<String>,
    #[serde(default)]
    pub structures: Vec<MarkingStructure>,
    /// Attributes of the `Marking` element other than `id` and `version`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<(String, String)>,
    /// Other children of the `Marking` element, such as an information source
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<Fragment>,
}

impl MarkingSpecification {
    pub fn new(structures: Vec<MarkingStructure>) -> Self {
        Self {
            structures,
            ..Default::default()
        }
    }

    /// Single TLP structure
    pub fn tlp(color: TlpColor) -> Self {
        Self::new(vec![MarkingStructure::tlp(color)])
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Equality ignoring the controlled structure
    pub fn same_marking(&self, other: &MarkingSpecification) -> bool {
        self.id == other.id
            && self.version == other.version
            && self.structures == other.structures
            && self.attributes == other.attributes
            && self.extensions == other.extensions
    }

    /// Copy of this spec bound to a path expression
    pub fn bound_to(&self, path: impl Into<String>) -> Self {
        Self {
            controlled_structure: Some(path.into()),
            ..self.clone()
        }
    }

    /// Copy of this spec with the controlled structure cleared
    pub fn unbound(&self) -> Self {
        Self {
            controlled_structure: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for MarkingSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self
            .structures
            .iter()
            .map(|s| match (s.color(), &s.xsi_type) {
                (Some(color), _) => format!("TLP:{}", color),
                (None, Some(xsi_type)) => xsi_type.clone(),
                (None, None) => "structure".to_string(),
            })
            .collect();
        match &self.id {
            Some(id) => write!(f, "{} [{}]", id, labels.join(", ")),
            None => write!(f, "[{}]", labels.join(", ")),
        }
    }
}

/// A marking applied to one position
#[derive(Debug, Clone, PartialEq)]
pub struct MarkingEntry {
    pub anchor: TreePosition,
    pub spec: MarkingSpecification,
    /// Applies to every node beneath the anchor; always false for leaves
    pub descendants: bool,
}

impl MarkingEntry {
    pub(crate) fn matches(&self, anchor: &TreePosition, spec: &MarkingSpecification, descendants: bool) -> bool {
        self.anchor == *anchor && self.descendants == descendants && self.spec.same_marking(spec)
    }
}

/// A marking applied to the whole document
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalMarkingEntry {
    pub spec: MarkingSpecification,
}

/// Options for `get_markings_with`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkingQuery {
    /// Also include markings anchored anywhere beneath the position
    pub descendants: bool,
    /// Also include markings that apply to nothing in particular
    pub null_markings: bool,
}

impl MarkingQuery {
    pub fn descendants() -> Self {
        Self {
            descendants: true,
            ..Default::default()
        }
    }
}
