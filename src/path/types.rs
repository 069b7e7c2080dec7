//! Path expression types
//!
//! A controlled structure is either the document-wide expression or a path
//! relative to the element it is written in.
//! Format: `../../../stix:Observable[1]/descendant-or-self::node() | ../../../stix:Observable[1]/descendant-or-self::node()/@*`

use serde::{Deserialize, Serialize};
use std::fmt;

/// Document-wide expression
pub const GLOBAL_PATH: &str = "//node() | //@*";

/// Older document-wide expression without the attribute half
pub const LEGACY_GLOBAL_PATH: &str = "//node()";

/// Steps between the controlled structure and its annotation host
/// (`Controlled_Structure` -> `Marking` -> `Handling` -> host)
pub const BLOCK_DEPTH: usize = 3;

pub(crate) const SELF_NODE: &str = "self::node()";
pub(crate) const DESCENDANT_OR_SELF: &str = "descendant-or-self::node()";
pub(crate) const TEXT_NODE: &str = "text()";
pub(crate) const ALL_ATTRIBUTES: &str = "@*";

/// A parsed controlled structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathExpr {
    /// Applies to the entire document
    Global {
        /// Written in the older `//node()` form
        legacy: bool,
    },
    Relative(RelativePath),
}

impl PathExpr {
    pub fn global() -> Self {
        PathExpr::Global { legacy: false }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, PathExpr::Global { .. })
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathExpr::Global { legacy: false } => write!(f, "{}", GLOBAL_PATH),
            PathExpr::Global { legacy: true } => write!(f, "{}", LEGACY_GLOBAL_PATH),
            PathExpr::Relative(path) => write!(f, "{}", path),
        }
    }
}

/// Path from the controlled structure to its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativePath {
    /// Number of `..` steps
    pub up: usize,
    /// Child steps taken after climbing
    pub steps: Vec<PathStep>,
    pub selector: Selector,
}

impl RelativePath {
    /// True if the path covers the whole subtree of its target element
    pub fn applies_to_descendants(&self) -> bool {
        self.selector == Selector::DescendantOrSelf
    }

    /// Everything before the terminal selector, e.g. `../../../stix:Title[1]`
    fn prefix(&self) -> String {
        let mut parts: Vec<String> = vec!["..".to_string(); self.up];
        parts.extend(self.steps.iter().map(|s| s.to_string()));
        parts.join("/")
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.prefix();
        let base = if prefix.is_empty() {
            self.selector.to_string()
        } else {
            format!("{}/{}", prefix, self.selector)
        };

        if self.applies_to_descendants() {
            write!(f, "{} | {}/{}", base, base, ALL_ATTRIBUTES)
        } else {
            write!(f, "{}", base)
        }
    }
}

/// A child step, optionally with a 1-based position among same-named siblings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    /// Qualified element name as written
    pub name: String,
    pub position: Option<usize>,
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(k) => write!(f, "{}[{}]", self.name, k),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Terminal selector of a relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// `self::node()`: the element only
    SelfNode,
    /// `descendant-or-self::node()`: the element and everything beneath it
    DescendantOrSelf,
    /// `@name`
    Attribute(String),
    /// `text()`
    Text,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::SelfNode => write!(f, "{}", SELF_NODE),
            Selector::DescendantOrSelf => write!(f, "{}", DESCENDANT_OR_SELF),
            Selector::Attribute(name) => write!(f, "@{}", name),
            Selector::Text => write!(f, "{}", TEXT_NODE),
        }
    }
}
