//! Path codec
//!
//! Converts between tree positions and the controlled structure expressions
//! written into annotation blocks.
//!
//! # Example expressions
//!
//! ```text
//! //node() | //@*                                     whole document
//! ../../../descendant-or-self::node() | ../../../descendant-or-self::node()/@*
//! │        └── host element and everything beneath it
//! └─────────── Controlled_Structure -> Marking -> Handling -> host
//! ../../../../stix:Observables[1]/cybox:Observable[2]/self::node()
//! ../../../indicator:Title[1]/text()
//! ../../../@timestamp
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use docmark::path::{encode, parse, resolve, PathExpr};
//!
//! let expr = encode(&doc, &anchor, true, host)?;
//! if let PathExpr::Relative(path) = parse(&expr.to_string())? {
//!     let (position, descendants) = resolve(&doc, controlled_structure, &path)?;
//! }
//! ```

mod codec;
mod parser;
mod types;

// Re-export main types
pub use types::{
    PathExpr, PathStep, RelativePath, Selector, BLOCK_DEPTH, GLOBAL_PATH, LEGACY_GLOBAL_PATH,
};

// Re-export parser functions
pub use parser::{parse, PathParseError};

// Re-export encoder and resolver
pub use codec::{encode, resolve};
