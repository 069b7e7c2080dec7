//! Marked document container
//!
//! Pairs one `Document` with the `MarkingRegistry` for it. Parsing extracts
//! the inline annotation blocks into the registry; output materializes them
//! again on a copy of the tree.

use serde_json::Value;
use std::io::Read;
use std::path::Path;

use crate::config::MarkingConfig;
use crate::document::{Document, HostPolicy, NodeRef, TreePosition};
use crate::error::{MarkingError, Result};
use crate::flush::{extract, materialize, ExtractReport};
use crate::markings::{MarkingEntry, MarkingQuery, MarkingRegistry, MarkingSpecification};
use crate::values::{AnnotatableValue, ValueKind};

/// A document together with the markings applied to it
#[derive(Debug, Clone)]
pub struct MarkedDocument {
    document: Document,
    registry: MarkingRegistry,
    config: MarkingConfig,
    report: ExtractReport,
}

impl MarkedDocument {
    /// Start an unmarked document with a single root element
    pub fn new(root_name: &str) -> Self {
        let document = Document::new(root_name);
        let registry = MarkingRegistry::new(&document);
        Self {
            document,
            registry,
            config: MarkingConfig::default(),
            report: ExtractReport::default(),
        }
    }

    /// Wrap a document, extracting any markings it already carries
    pub fn from_document(document: Document) -> Result<Self> {
        Self::with_config(document, MarkingConfig::default())
    }

    pub fn with_config(mut document: Document, config: MarkingConfig) -> Result<Self> {
        let mut registry = MarkingRegistry::new(&document);
        let report = extract(&mut document, &mut registry, &config)?;
        Ok(Self {
            document,
            registry,
            config,
            report,
        })
    }

    pub fn parse_str(input: &str) -> Result<Self> {
        Self::from_document(Document::parse_str(input)?)
    }

    pub fn parse_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_document(Document::parse_reader(reader)?)
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_document(Document::parse_file(path)?)
    }

    /// The document without its annotation blocks
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the tree.
    ///
    /// Use `detach` to remove subtrees so the registry stays consistent.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn registry(&self) -> &MarkingRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MarkingConfig {
        &self.config
    }

    /// What the initial extract pass registered and skipped
    pub fn report(&self) -> &ExtractReport {
        &self.report
    }

    pub fn root(&self) -> NodeRef {
        self.document.root()
    }

    /// Reject positions inside annotation blocks
    fn check_markable(&self, position: &TreePosition) -> Result<()> {
        let policy = HostPolicy::new(&self.config);
        if policy.is_annotation_node(&self.document, position.owner())? {
            return Err(MarkingError::InvalidTarget(format!(
                "{} is part of an annotation block",
                position
            )));
        }
        Ok(())
    }

    /// Apply `spec` to `anchor`, returning the wrapped value for leaf anchors
    pub fn add_marking(
        &mut self,
        anchor: impl Into<TreePosition>,
        spec: &MarkingSpecification,
        descendants: bool,
    ) -> Result<Option<AnnotatableValue>> {
        let anchor = anchor.into();
        self.check_markable(&anchor)?;
        self.registry
            .add_marking(&self.document, anchor, spec, descendants)
    }

    pub fn add_marking_as(
        &mut self,
        anchor: impl Into<TreePosition>,
        spec: &MarkingSpecification,
        kind: ValueKind,
    ) -> Result<AnnotatableValue> {
        let anchor = anchor.into();
        self.check_markable(&anchor)?;
        self.registry
            .add_marking_as(&self.document, anchor, spec, kind)
    }

    pub fn add_global(&mut self, spec: &MarkingSpecification) -> Result<()> {
        self.registry.add_global(spec)
    }

    pub fn add_null(&mut self, spec: &MarkingSpecification) -> Result<()> {
        self.registry.add_null(spec)
    }

    pub fn get_markings(&self, position: impl Into<TreePosition>) -> Result<Vec<MarkingSpecification>> {
        self.registry.get_markings(&self.document, &position.into())
    }

    pub fn get_markings_with(
        &self,
        position: impl Into<TreePosition>,
        query: MarkingQuery,
    ) -> Result<Vec<MarkingSpecification>> {
        self.registry
            .get_markings_with(&self.document, &position.into(), query)
    }

    pub fn is_marked(
        &self,
        position: impl Into<TreePosition>,
        spec: Option<&MarkingSpecification>,
        descendants: bool,
    ) -> Result<bool> {
        self.registry
            .is_marked(&self.document, &position.into(), spec, descendants)
    }

    /// Remove a marking applied exactly at `anchor`.
    ///
    /// Fails with `NotFound` when the marking is only inherited here.
    pub fn remove_marking(
        &mut self,
        anchor: impl Into<TreePosition>,
        spec: &MarkingSpecification,
        descendants: bool,
    ) -> Result<()> {
        let anchor = anchor.into();
        self.document.check(&anchor)?;
        if self.registry.remove_marking(&anchor, spec, descendants) {
            return Ok(());
        }

        let inherited = self
            .registry
            .is_marked(&self.document, &anchor, Some(spec), false)?;
        if inherited {
            Err(MarkingError::NotFound(format!(
                "{} is not applied at {} (it is inherited or applied with a different descendants flag)",
                spec, anchor
            )))
        } else {
            Err(MarkingError::NotFound(format!("{} does not mark {}", spec, anchor)))
        }
    }

    pub fn remove_global(&mut self, spec: &MarkingSpecification) -> Result<()> {
        if self.registry.remove_global(spec) {
            Ok(())
        } else {
            Err(MarkingError::NotFound(format!("{} is not a global marking", spec)))
        }
    }

    pub fn remove_null(&mut self, spec: &MarkingSpecification) -> Result<()> {
        if self.registry.remove_null(spec) {
            Ok(())
        } else {
            Err(MarkingError::NotFound(format!("{} is not a null marking", spec)))
        }
    }

    /// Remove every marking applied at `position` (and beneath it with
    /// `descendants`). Returns how many were removed.
    pub fn clear_markings(&mut self, position: impl Into<TreePosition>, descendants: bool) -> Result<usize> {
        self.registry
            .clear_markings(&self.document, &position.into(), descendants)
    }

    /// Detach a subtree and drop the markings anchored inside it.
    /// Returns how many markings were dropped.
    pub fn detach(&mut self, node: NodeRef) -> Result<usize> {
        self.document.detach(node)?;
        Ok(self.registry.prune(&self.document))
    }

    /// Current value of a marked leaf
    pub fn value(&self, position: &TreePosition) -> Result<Option<AnnotatableValue>> {
        self.registry.value(&self.document, position)
    }

    pub fn global_markings(&self) -> Vec<&MarkingSpecification> {
        self.registry.global_markings()
    }

    pub fn null_markings(&self) -> &[MarkingSpecification] {
        self.registry.null_markings()
    }

    pub fn field_markings(&self) -> &[MarkingEntry] {
        self.registry.field_markings()
    }

    /// The tree with every marking written as an inline annotation block
    pub fn to_document(&self) -> Result<Document> {
        materialize(&self.document, &self.registry, &self.config)
    }

    pub fn to_xml(&self, pretty: bool) -> Result<String> {
        self.to_document()?.to_xml(pretty)
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(self.to_document()?.to_json())
    }
}
