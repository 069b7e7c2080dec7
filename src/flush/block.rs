//! Marking element reading and writing
//!
//! ```text
//! <P:Handling>
//!   <marking:Marking id=".." version="..">
//!     <marking:Controlled_Structure>EXPR</marking:Controlled_Structure>
//!     <marking:Marking_Structure xsi:type="tlpMarking:TLPMarkingStructureType" color="RED"/>
//!   </marking:Marking>
//! </P:Handling>
//! ```

use std::collections::BTreeSet;

use crate::config::MarkingConfig;
use crate::document::{split_qname, Document, Fragment, NodeRef};
use crate::error::Result;
use crate::markings::{MarkingSpecification, MarkingStructure};

const XSI_TYPE: &str = "xsi:type";

/// Append a `Marking` element for `spec` to an annotation block.
///
/// Prefixes used by the written names and `xsi:type` values are added to
/// `prefixes`.
pub(crate) fn write_marking(
    doc: &mut Document,
    block: NodeRef,
    spec: &MarkingSpecification,
    config: &MarkingConfig,
    prefixes: &mut BTreeSet<String>,
) -> Result<NodeRef> {
    let marking = doc.append_element(block, &config.marking_name(&config.marking_element))?;
    prefixes.insert(config.marking_prefix.clone());

    if let Some(id) = &spec.id {
        doc.set_attribute(marking, "id", id)?;
    }
    if let Some(version) = &spec.version {
        doc.set_attribute(marking, "version", version)?;
    }
    for (name, value) in &spec.attributes {
        doc.set_attribute(marking, name, value)?;
        note_prefix(prefixes, name);
    }

    if let Some(path) = &spec.controlled_structure {
        let name = config.marking_name(&config.controlled_structure_element);
        let structure = doc.append_element(marking, &name)?;
        doc.set_text(structure, path)?;
    }

    let structure_name = config.marking_name(&config.marking_structure_element);
    for structure in &spec.structures {
        let node = doc.append_element(marking, &structure_name)?;

        if let Some(xsi_type) = &structure.xsi_type {
            doc.set_attribute(node, XSI_TYPE, xsi_type)?;
            note_prefix(prefixes, XSI_TYPE);
            note_prefix(prefixes, xsi_type);
        }
        for (name, value) in &structure.attributes {
            doc.set_attribute(node, name, value)?;
            note_prefix(prefixes, name);
        }
        for element in &structure.elements {
            write_fragment(doc, node, element, prefixes)?;
        }
    }

    for extension in &spec.extensions {
        write_fragment(doc, marking, extension, prefixes)?;
    }

    Ok(marking)
}

fn write_fragment(
    doc: &mut Document,
    parent: NodeRef,
    fragment: &Fragment,
    prefixes: &mut BTreeSet<String>,
) -> Result<()> {
    fragment.append_to(doc, parent)?;
    for name in fragment.qualified_names() {
        note_prefix(prefixes, name);
    }
    Ok(())
}

fn note_prefix(prefixes: &mut BTreeSet<String>, qname: &str) {
    match split_qname(qname) {
        (Some("xmlns"), _) | (None, _) => {}
        (Some(prefix), _) => {
            prefixes.insert(prefix.to_string());
        }
    }
}

/// Read a `Marking` element back into an unbound spec.
///
/// Returns the spec and, when present, the controlled structure element with
/// its text.
pub(crate) fn read_marking(
    doc: &Document,
    marking: NodeRef,
    config: &MarkingConfig,
) -> Result<(MarkingSpecification, Option<(NodeRef, String)>)> {
    let mut spec = MarkingSpecification::default();
    for attr in doc.attributes(marking)? {
        match attr.name.as_str() {
            "id" => spec.id = Some(attr.value.clone()),
            "version" => spec.version = Some(attr.value.clone()),
            _ => spec.attributes.push((attr.name.clone(), attr.value.clone())),
        }
    }
    let mut controlled = None;

    for child in doc.children(marking)? {
        let local = doc.local_name(child)?;
        if local == config.controlled_structure_element && controlled.is_none() {
            let text = doc.text(child)?.unwrap_or_default().to_string();
            controlled = Some((child, text));
        } else if local == config.marking_structure_element {
            spec.structures.push(read_structure(doc, child)?);
        } else {
            spec.extensions.push(Fragment::from_node(doc, child)?);
        }
    }

    Ok((spec, controlled))
}

fn read_structure(doc: &Document, node: NodeRef) -> Result<MarkingStructure> {
    let mut structure = MarkingStructure::default();

    for attr in doc.attributes(node)? {
        if attr.name == XSI_TYPE {
            structure.xsi_type = Some(attr.value.clone());
        } else {
            structure.attributes.push((attr.name.clone(), attr.value.clone()));
        }
    }

    for child in doc.children(node)? {
        structure.elements.push(Fragment::from_node(doc, child)?);
    }

    Ok(structure)
}
