//! Docmark Library
//!
//! Data marking overlay for structured XML documents. Markings (handling
//! labels such as TLP colors) are applied to elements, attributes and text
//! without touching the document content, and travel inside the document as
//! inline annotation blocks addressed by small path expressions.
//!
//! # Modules
//!
//! - `document`: Element tree, node identity and annotation hosting
//! - `path`: Controlled structure expressions (parse, encode, resolve)
//! - `markings`: Marking data model and registry
//! - `values`: Typed leaf values usable as marking anchors
//! - `flush`: Registry <-> inline annotation blocks
//! - `container`: `MarkedDocument`, a document paired with its registry
//!
//! # Usage
//!
//! ```ignore
//! use docmark::{MarkedDocument, MarkingSpecification, TlpColor};
//!
//! let mut marked = MarkedDocument::parse_file("package.xml")?;
//! let indicator = marked.document().children(marked.root())?[0];
//! marked.add_marking(indicator, &MarkingSpecification::tlp(TlpColor::Red), true)?;
//! let xml = marked.to_xml(true)?;
//! ```

pub mod config;
pub mod container;
pub mod document;
pub mod error;
pub mod flush;
pub mod markings;
pub mod path;
pub mod values;

pub use config::MarkingConfig;
pub use container::MarkedDocument;
pub use document::{Document, Fragment, FragmentNode, NodeRef, TreePosition};
pub use error::{MarkingError, Result};
pub use flush::{ExtractReport, SkippedBlock};
pub use markings::{
    MarkingEntry, MarkingQuery, MarkingRegistry, MarkingSpecification, MarkingStructure, TlpColor,
};
pub use values::{AnnotatableValue, Primitive, ValueKind};
