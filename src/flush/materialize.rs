//! Materialize pass
//!
//! Writes every registered marking into a copy of the document as inline
//! annotation blocks.

use std::collections::BTreeSet;

use super::block::write_marking;
use crate::config::MarkingConfig;
use crate::document::{Document, HostPolicy, NodeRef, TreePosition};
use crate::error::Result;
use crate::markings::{MarkingEntry, MarkingRegistry};
use crate::path::{encode, PathExpr};

/// Produce a copy of `doc` carrying every marking in `registry`.
///
/// Blocks are written in document order: globals first, then field markings
/// by anchor position, then null markings. The source document is left
/// unchanged, so materializing twice gives identical output.
pub fn materialize(
    doc: &Document,
    registry: &MarkingRegistry,
    config: &MarkingConfig,
) -> Result<Document> {
    let mut out = doc.clone();
    let policy = HostPolicy::new(config);
    let mut prefixes = BTreeSet::new();
    let mut written = 0;

    let globals = registry.global_markings();
    if !globals.is_empty() {
        let header = policy.ensure_header(&mut out)?;
        let block = policy.attach_annotation_block(&mut out, header)?;
        for spec in globals {
            let bound = spec.bound_to(PathExpr::global().to_string());
            write_marking(&mut out, block, &bound, config, &mut prefixes)?;
            written += 1;
        }
    }

    for node in doc.walk() {
        for entry in entries_at(doc, registry, node)? {
            let host = policy.nearest_annotation_host(&out, &entry.anchor)?;
            let host = policy.resolve(&mut out, host)?;
            let path = encode(&out, &entry.anchor, entry.descendants, host)?;
            let block = policy.attach_annotation_block(&mut out, host)?;

            tracing::debug!("Writing {} at {} as '{}'", entry.spec, host, path);
            let bound = entry.spec.bound_to(path.to_string());
            write_marking(&mut out, block, &bound, config, &mut prefixes)?;
            written += 1;
        }
    }

    let nulls = registry.null_markings();
    if !nulls.is_empty() {
        let header = policy.ensure_header(&mut out)?;
        let block = policy.attach_annotation_block(&mut out, header)?;
        for spec in nulls {
            write_marking(&mut out, block, spec, config, &mut prefixes)?;
            written += 1;
        }
    }

    for prefix in &prefixes {
        if *prefix == config.marking_prefix {
            out.declare_namespace(prefix, &config.marking_namespace)?;
        } else if let Some(uri) = config.namespaces.get(prefix) {
            out.declare_namespace(prefix, uri)?;
        }
    }

    tracing::info!("Materialized {} markings", written);
    Ok(out)
}

/// Entries owned by `node`: element entries in insertion order, then
/// attribute entries in attribute order, then the text entry
fn entries_at<'a>(
    doc: &Document,
    registry: &'a MarkingRegistry,
    node: NodeRef,
) -> Result<Vec<&'a MarkingEntry>> {
    let attributes = doc.attributes(node)?;

    let mut entries: Vec<(usize, usize, &MarkingEntry)> = registry
        .field_markings()
        .iter()
        .filter(|e| e.anchor.owner() == node)
        .map(|e| match &e.anchor {
            TreePosition::Node(_) => (0, 0, e),
            TreePosition::Attribute { name, .. } => {
                let index = attributes.iter().position(|a| a.name == *name).unwrap_or(usize::MAX);
                (1, index, e)
            }
            TreePosition::Text(_) => (2, 0, e),
        })
        .collect();

    entries.sort_by_key(|(group, index, _)| (*group, *index));
    Ok(entries.into_iter().map(|(_, _, e)| e).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markings::{MarkingSpecification, TlpColor};

    fn package() -> (Document, NodeRef, NodeRef, NodeRef) {
        let mut doc = Document::new("stix:STIX_Package");
        let root = doc.root();
        doc.set_attribute(root, "xmlns:stix", "http://stix.mitre.org/stix-1").unwrap();
        let indicators = doc.append_element(root, "stix:Indicators").unwrap();
        let indicator = doc.append_element(indicators, "stix:Indicator").unwrap();
        doc.set_attribute(indicator, "id", "example:indicator-1").unwrap();
        let title = doc.append_element(indicator, "indicator:Title").unwrap();
        doc.set_text(title, "Gonna Mark This").unwrap();
        let observables = doc.append_element(root, "stix:Observables").unwrap();
        let observable = doc.append_element(observables, "cybox:Observable").unwrap();
        (doc, indicator, title, observable)
    }

    fn controlled_structures(doc: &Document) -> Vec<String> {
        doc.walk()
            .into_iter()
            .filter(|n| doc.local_name(*n).unwrap() == "Controlled_Structure")
            .map(|n| doc.text(n).unwrap().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_blocks_in_document_order() {
        let (doc, indicator, title, observable) = package();
        let config = MarkingConfig::default();
        let mut registry = MarkingRegistry::new(&doc);

        registry
            .add_marking(&doc, TreePosition::text(title), &MarkingSpecification::tlp(TlpColor::Red), false)
            .unwrap();
        registry
            .add_marking(&doc, indicator, &MarkingSpecification::tlp(TlpColor::Amber), true)
            .unwrap();
        registry
            .add_marking(&doc, observable, &MarkingSpecification::tlp(TlpColor::Green), false)
            .unwrap();
        registry.add_global(&MarkingSpecification::tlp(TlpColor::White)).unwrap();

        let out = materialize(&doc, &registry, &config).unwrap();
        assert_eq!(
            controlled_structures(&out),
            vec![
                "//node() | //@*",
                "../../../../stix:Observables[1]/cybox:Observable[1]/self::node()",
                "../../../descendant-or-self::node() | ../../../descendant-or-self::node()/@*",
                "../../../indicator:Title[1]/text()",
            ]
        );

        let root = out.root();
        assert_eq!(
            out.attribute(root, "xmlns:marking").unwrap(),
            Some("http://data-marking.mitre.org/Marking-1")
        );
        assert!(out.attribute(root, "xmlns:tlpMarking").unwrap().is_some());
        assert!(out.attribute(root, "xmlns:simpleMarking").unwrap().is_none());
    }

    #[test]
    fn test_source_document_untouched() {
        let (doc, indicator, _, _) = package();
        let config = MarkingConfig::default();
        let mut registry = MarkingRegistry::new(&doc);
        registry
            .add_marking(&doc, indicator, &MarkingSpecification::tlp(TlpColor::Red), true)
            .unwrap();

        let before = doc.to_json();
        let first = materialize(&doc, &registry, &config).unwrap().to_xml(false).unwrap();
        let second = materialize(&doc, &registry, &config).unwrap().to_xml(false).unwrap();

        assert_eq!(doc.to_json(), before);
        assert_eq!(first, second);
        assert_eq!(first.matches("<stix:Handling>").count(), 1);
    }

    #[test]
    fn test_null_markings_written_to_header() {
        let (doc, _, _, _) = package();
        let config = MarkingConfig::default();
        let mut registry = MarkingRegistry::new(&doc);
        registry.add_null(&MarkingSpecification::tlp(TlpColor::White)).unwrap();

        let out = materialize(&doc, &registry, &config).unwrap();
        let header = out.children(out.root()).unwrap()[0];
        assert_eq!(out.name(header).unwrap(), "stix:STIX_Header");
        assert!(controlled_structures(&out).is_empty());
        assert_eq!(out.descendants(header).unwrap().len(), 3);
    }
}
