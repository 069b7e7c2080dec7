//! Annotation hosting
//!
//! Decides where an inline annotation block may live. Elements listed in the
//! config (and any element that already carries a block) can host one; every
//! other element is observable-like and defers to its nearest eligible
//! ancestor, or to the document header when there is none.

use super::tree::Document;
use super::types::{NodeRef, TreePosition};
use crate::config::MarkingConfig;
use crate::error::Result;

/// Where an annotation block for a position belongs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationHost {
    Node(NodeRef),
    /// The document header, which may not exist yet
    Header,
}

/// Hosting rules derived from a `MarkingConfig`
pub struct HostPolicy<'a> {
    config: &'a MarkingConfig,
}

impl<'a> HostPolicy<'a> {
    pub fn new(config: &'a MarkingConfig) -> Self {
        Self { config }
    }

    /// Existing annotation block directly under `node`
    pub fn handling_block(&self, doc: &Document, node: NodeRef) -> Result<Option<NodeRef>> {
        for child in doc.children(node)? {
            if doc.local_name(child)? == self.config.handling_element {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// True if `node` already has, or is permitted to have, an annotation block
    pub fn can_host(&self, doc: &Document, node: NodeRef) -> Result<bool> {
        if node == doc.root() || self.is_annotation_node(doc, node)? {
            return Ok(false);
        }
        let local = doc.local_name(node)?;
        if self.config.is_host_element(local) || self.is_header(doc, node)? {
            return Ok(true);
        }
        Ok(self.handling_block(doc, node)?.is_some())
    }

    pub fn is_observable_like(&self, doc: &Document, node: NodeRef) -> Result<bool> {
        Ok(!self.can_host(doc, node)?)
    }

    /// True for the annotation block elements themselves and everything inside
    pub fn is_annotation_node(&self, doc: &Document, node: NodeRef) -> Result<bool> {
        let mut chain = vec![node];
        chain.extend(doc.ancestors(node)?);
        for n in chain {
            if doc.local_name(n)? == self.config.handling_element {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_header(&self, doc: &Document, node: NodeRef) -> Result<bool> {
        Ok(doc.parent(node)? == Some(doc.root())
            && doc.local_name(node)? == self.config.header_element)
    }

    /// Nearest ancestor-or-self of the position's element that can host a block
    pub fn nearest_annotation_host(
        &self,
        doc: &Document,
        position: &TreePosition,
    ) -> Result<AnnotationHost> {
        let start = position.owner();
        let mut chain = vec![start];
        chain.extend(doc.ancestors(start)?);

        for node in chain {
            if self.can_host(doc, node)? {
                return Ok(AnnotationHost::Node(node));
            }
        }
        Ok(AnnotationHost::Header)
    }

    pub fn find_header(&self, doc: &Document) -> Result<Option<NodeRef>> {
        for child in doc.children(doc.root())? {
            if doc.local_name(child)? == self.config.header_element {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    /// Header element, inserted as the root's first child when missing
    pub fn ensure_header(&self, doc: &mut Document) -> Result<NodeRef> {
        if let Some(header) = self.find_header(doc)? {
            return Ok(header);
        }
        let root = doc.root();
        let name = qualify(doc.prefix(root)?, &self.config.header_element);
        let header = doc.insert_element(root, 0, &name)?;
        tracing::debug!("Created document header {}", header);
        Ok(header)
    }

    pub fn resolve(&self, doc: &mut Document, host: AnnotationHost) -> Result<NodeRef> {
        match host {
            AnnotationHost::Node(node) => Ok(node),
            AnnotationHost::Header => self.ensure_header(doc),
        }
    }

    /// Annotation block of `host`, created as its first child when missing.
    /// The block takes the host's own prefix.
    pub fn attach_annotation_block(&self, doc: &mut Document, host: NodeRef) -> Result<NodeRef> {
        if let Some(block) = self.handling_block(doc, host)? {
            return Ok(block);
        }
        let name = qualify(doc.prefix(host)?, &self.config.handling_element);
        doc.insert_element(host, 0, &name)
    }
}

fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        doc: Document,
        incident: NodeRef,
        indicator: NodeRef,
        observable: NodeRef,
        address: NodeRef,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new("stix:STIX_Package");
        let root = doc.root();
        let incidents = doc.append_element(root, "stix:Incidents").unwrap();
        let incident = doc.append_element(incidents, "stix:Incident").unwrap();
        let related = doc.append_element(incident, "incident:Related_Indicators").unwrap();
        let indicator = doc.append_element(related, "stix:Indicator").unwrap();
        let observables = doc.append_element(root, "stix:Observables").unwrap();
        let observable = doc.append_element(observables, "cybox:Observable").unwrap();
        let address = doc.append_element(observable, "AddressObj:Address_Value").unwrap();
        doc.set_text(address, "10.0.0.1").unwrap();
        Fixture {
            doc,
            incident,
            indicator,
            observable,
            address,
        }
    }

    #[test]
    fn test_host_eligibility() {
        let f = fixture();
        let config = MarkingConfig::default();
        let policy = HostPolicy::new(&config);

        assert!(policy.can_host(&f.doc, f.incident).unwrap());
        assert!(policy.is_observable_like(&f.doc, f.observable).unwrap());
        assert!(!policy.can_host(&f.doc, f.doc.root()).unwrap());
    }

    #[test]
    fn test_nearest_host_is_closest_ancestor() {
        let f = fixture();
        let config = MarkingConfig::default();
        let policy = HostPolicy::new(&config);

        let id_attr = TreePosition::attribute(f.indicator, "id");
        assert_eq!(
            policy.nearest_annotation_host(&f.doc, &id_attr).unwrap(),
            AnnotationHost::Node(f.indicator)
        );
        assert_eq!(
            policy
                .nearest_annotation_host(&f.doc, &TreePosition::Node(f.incident))
                .unwrap(),
            AnnotationHost::Node(f.incident)
        );
    }

    #[test]
    fn test_observable_falls_back_to_header() {
        let mut f = fixture();
        let config = MarkingConfig::default();
        let policy = HostPolicy::new(&config);

        let text = TreePosition::text(f.address);
        let host = policy.nearest_annotation_host(&f.doc, &text).unwrap();
        assert_eq!(host, AnnotationHost::Header);

        let header = policy.resolve(&mut f.doc, host).unwrap();
        assert_eq!(f.doc.name(header).unwrap(), "stix:STIX_Header");
        assert_eq!(f.doc.children(f.doc.root()).unwrap()[0], header);
        assert_eq!(policy.ensure_header(&mut f.doc).unwrap(), header);
    }

    #[test]
    fn test_attach_block_once() {
        let mut f = fixture();
        let config = MarkingConfig::default();
        let policy = HostPolicy::new(&config);

        let block = policy.attach_annotation_block(&mut f.doc, f.indicator).unwrap();
        assert_eq!(f.doc.name(block).unwrap(), "stix:Handling");
        assert_eq!(
            policy.attach_annotation_block(&mut f.doc, f.indicator).unwrap(),
            block
        );
        assert!(policy.is_annotation_node(&f.doc, block).unwrap());
        assert!(!policy.is_annotation_node(&f.doc, f.indicator).unwrap());
    }

    #[test]
    fn test_existing_block_makes_host() {
        let mut f = fixture();
        let config = MarkingConfig::default();
        let policy = HostPolicy::new(&config);

        f.doc.append_element(f.observable, "cybox:Handling").unwrap();
        assert!(policy.can_host(&f.doc, f.observable).unwrap());
    }
}
