//! Markings module
//!
//! The marking data model and the registry that applies markings to tree
//! positions.
//!
//! A marking applied to an element with `descendants` set is inherited by
//! everything beneath it. Inherited markings are reported by queries but can
//! only be removed where they were applied.

mod registry;
mod types;

pub use registry::MarkingRegistry;
pub use types::{
    GlobalMarkingEntry, MarkingEntry, MarkingQuery, MarkingSpecification, MarkingStructure,
    TlpColor,
};
