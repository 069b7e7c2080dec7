//! Extract pass
//!
//! Reads the annotation blocks of a freshly parsed document into a registry.

use serde::Serialize;

use super::block::read_marking;
use crate::config::MarkingConfig;
use crate::document::{Document, HostPolicy, NodeRef, TreePosition};
use crate::error::{MarkingError, Result};
use crate::markings::{MarkingRegistry, MarkingSpecification};
use crate::path::{parse, resolve, PathExpr};

/// Outcome of an extract pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractReport {
    /// Markings moved from the document into the registry
    pub registered: usize,
    /// Markings left in the document untouched
    pub skipped: Vec<SkippedBlock>,
}

/// A marking the extract pass could not interpret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedBlock {
    pub path: String,
    pub reason: String,
}

enum Decoded {
    Global(MarkingSpecification),
    Null(MarkingSpecification),
    Field {
        anchor: TreePosition,
        descendants: bool,
        spec: MarkingSpecification,
    },
}

/// Move every interpretable marking out of `doc` and into `registry`.
///
/// Markings are decoded in document order against the unmodified tree, then
/// registered and detached. A marking whose path cannot be decoded, or that
/// repeats one already registered, stays in the document and is reported as
/// skipped.
pub fn extract(
    doc: &mut Document,
    registry: &mut MarkingRegistry,
    config: &MarkingConfig,
) -> Result<ExtractReport> {
    let policy = HostPolicy::new(config);
    let mut report = ExtractReport::default();
    let mut decoded = Vec::new();

    for marking in marking_elements(doc, config)? {
        let (spec, controlled) = read_marking(doc, marking, config)?;
        let (context, path) = match controlled {
            Some(found) => found,
            None => {
                decoded.push((marking, String::new(), Decoded::Null(spec)));
                continue;
            }
        };

        match decode(doc, &policy, config, context, &path, spec) {
            Ok(entry) => decoded.push((marking, path, entry)),
            Err(err) if err.is_recoverable() => {
                tracing::warn!("Skipping marking with path '{}': {}", path, err);
                report.skipped.push(SkippedBlock {
                    path,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    let mut emptied = Vec::new();
    for (marking, path, entry) in decoded {
        let registered = match entry {
            Decoded::Global(spec) => registry.add_global(&spec),
            Decoded::Null(spec) => registry.add_null(&spec),
            Decoded::Field {
                anchor,
                descendants,
                spec,
            } => registry.add_marking(doc, anchor, &spec, descendants).map(|_| ()),
        };

        match registered {
            Ok(()) => {
                tracing::debug!("Extracted marking with path '{}'", path);
                if let Some(block) = doc.parent(marking)? {
                    emptied.push(block);
                }
                doc.detach(marking)?;
                report.registered += 1;
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!("Skipping marking with path '{}': {}", path, err);
                report.skipped.push(SkippedBlock {
                    path,
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    for block in emptied {
        if doc.is_live(block) && doc.children(block)?.is_empty() {
            doc.detach(block)?;
        }
    }

    tracing::info!(
        "Extracted {} markings, skipped {}",
        report.registered,
        report.skipped.len()
    );
    Ok(report)
}

/// Every `Marking` element directly inside an annotation block, in document order
fn marking_elements(doc: &Document, config: &MarkingConfig) -> Result<Vec<NodeRef>> {
    let mut out = Vec::new();
    for node in doc.walk() {
        if doc.local_name(node)? != config.handling_element {
            continue;
        }
        for child in doc.children(node)? {
            if doc.local_name(child)? == config.marking_element {
                out.push(child);
            }
        }
    }
    Ok(out)
}

fn decode(
    doc: &Document,
    policy: &HostPolicy,
    config: &MarkingConfig,
    context: NodeRef,
    path: &str,
    spec: MarkingSpecification,
) -> Result<Decoded> {
    let unsupported = |reason: &str| MarkingError::UnsupportedPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let relative = match parse(path).map_err(|e| MarkingError::unsupported(path, e))? {
        PathExpr::Global { legacy: true } if !config.accept_legacy_global => {
            return Err(unsupported("legacy global expression is not accepted"))
        }
        PathExpr::Global { .. } => return Ok(Decoded::Global(spec)),
        PathExpr::Relative(relative) => relative,
    };

    let (anchor, descendants) = resolve(doc, context, &relative)?;

    if anchor == TreePosition::Node(doc.root()) {
        if descendants {
            return Ok(Decoded::Global(spec));
        }
        return Err(unsupported("the document root can only carry global markings"));
    }
    if policy.is_annotation_node(doc, anchor.owner())? {
        return Err(unsupported("path selects an annotation block"));
    }

    Ok(Decoded::Field {
        anchor,
        descendants,
        spec,
    })
}
