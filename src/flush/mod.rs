//! Flush passes
//!
//! - `materialize`: registry -> inline annotation blocks, on a copy of the document
//! - `extract`: inline annotation blocks -> registry, removing what it reads

mod block;
mod extract;
mod materialize;

pub use extract::{extract, ExtractReport, SkippedBlock};
pub use materialize::materialize;
