//! Document module
//!
//! The element tree that markings are overlaid on.
//!
//! # Overview
//!
//! - `Document`: arena-backed tree with stable per-element identity
//! - `TreePosition`: an element, one of its attributes, or its text
//! - `Fragment`: owned copy of a subtree, for markup kept verbatim
//! - `HostPolicy`: which elements may carry an inline annotation block
//!
//! Documents are read and written with quick-xml; the marking core only cares
//! about the shape of the annotation blocks it inserts.

mod fragment;
mod host;
mod tree;
mod types;
mod xml;

pub use fragment::{Fragment, FragmentNode};
pub use host::{AnnotationHost, HostPolicy};
pub use tree::Document;
pub use types::{split_qname, Attribute, DocumentId, NodeRef, TreePosition};
