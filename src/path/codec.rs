//! Path encoding and resolution
//!
//! Encoding maps an anchor plus its descendants flag to the expression written
//! under the anchor's annotation host. Resolution walks such an expression
//! back from the controlled structure element it was read from.

use super::types::*;
use crate::document::{split_qname, Document, NodeRef, TreePosition};
use crate::error::{MarkingError, Result};

/// Encode the path from an annotation block under `host` to `anchor`.
///
/// The path climbs to the nearest common ancestor of host and anchor, then
/// steps down by positional child steps. Leaf anchors never carry the
/// descendants flag.
pub fn encode(
    doc: &Document,
    anchor: &TreePosition,
    descendants: bool,
    host: NodeRef,
) -> Result<PathExpr> {
    doc.check(anchor)?;
    let owner = anchor.owner();
    let common = doc.common_ancestor(host, owner)?;

    let up = BLOCK_DEPTH + doc.depth(host)? - doc.depth(common)?;

    let mut chain = Vec::new();
    if owner != common {
        chain.push(owner);
        chain.extend(doc.ancestors(owner)?.into_iter().take_while(|n| *n != common));
        chain.reverse();
    }

    let mut steps = Vec::with_capacity(chain.len());
    for node in chain {
        steps.push(PathStep {
            name: doc.name(node)?.to_string(),
            position: Some(doc.sibling_position(node)?),
        });
    }

    let selector = match anchor {
        TreePosition::Node(_) if descendants => Selector::DescendantOrSelf,
        TreePosition::Node(_) => Selector::SelfNode,
        TreePosition::Attribute { name, .. } => Selector::Attribute(name.clone()),
        TreePosition::Text(_) => Selector::Text,
    };

    Ok(PathExpr::Relative(RelativePath {
        up,
        steps,
        selector,
    }))
}

/// Resolve a relative path read from the controlled structure `context`.
///
/// Returns the target position and whether the path covers descendants.
pub fn resolve(
    doc: &Document,
    context: NodeRef,
    path: &RelativePath,
) -> Result<(TreePosition, bool)> {
    let unresolved = |reason: String| MarkingError::UnsupportedPath {
        path: path.to_string(),
        reason,
    };

    let mut current = context;
    for level in 0..path.up {
        current = doc
            .parent(current)?
            .ok_or_else(|| unresolved(format!("step {} climbs above the root", level + 1)))?;
    }

    for step in &path.steps {
        let (prefix, local) = split_qname(&step.name);
        let bound_at_context = doc.namespace_uri(context, prefix)?;

        let mut matches = Vec::new();
        for child in doc.children(current)? {
            // Prefixes unbound where the path is stored resolve in the child's scope
            let wanted = match &bound_at_context {
                Some(uri) => (uri.clone(), local.to_string()),
                None => doc.name_key(child, &step.name)?,
            };
            if doc.name_key(child, doc.name(child)?)? == wanted {
                matches.push(child);
            }
        }

        current = match step.position {
            Some(k) => *k
                .checked_sub(1)
                .and_then(|i| matches.get(i))
                .ok_or_else(|| unresolved(format!("no element matches {}", step)))?,
            None if matches.len() == 1 => matches[0],
            None => {
                return Err(unresolved(format!(
                    "{} matches {} elements, expected one",
                    step,
                    matches.len()
                )))
            }
        };
    }

    match &path.selector {
        Selector::SelfNode => Ok((TreePosition::Node(current), false)),
        Selector::DescendantOrSelf => Ok((TreePosition::Node(current), true)),
        Selector::Attribute(name) => {
            let position = TreePosition::attribute(current, name.as_str());
            doc.check(&position)
                .map_err(|_| unresolved(format!("attribute '{}' not present", name)))?;
            Ok((position, false))
        }
        Selector::Text => {
            let position = TreePosition::text(current);
            doc.check(&position)
                .map_err(|_| unresolved("element has no text".to_string()))?;
            Ok((position, false))
        }
    }
}
