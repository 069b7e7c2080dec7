//! Marking registry
//!
//! Owns every marking applied to one document. Entries are kept in insertion
//! order; the tree is consulted only to answer inheritance queries.

use std::collections::HashMap;

use super::types::{GlobalMarkingEntry, MarkingEntry, MarkingQuery, MarkingSpecification};
use crate::document::{Document, DocumentId, TreePosition};
use crate::error::{MarkingError, Result};
use crate::values::{AnnotatableValue, ValueKind};

/// Registry of markings applied to a single document
#[derive(Debug, Clone)]
pub struct MarkingRegistry {
    document: DocumentId,
    entries: Vec<MarkingEntry>,
    globals: Vec<GlobalMarkingEntry>,
    nulls: Vec<MarkingSpecification>,
    values: HashMap<TreePosition, AnnotatableValue>,
}

impl MarkingRegistry {
    pub fn new(doc: &Document) -> Self {
        Self {
            document: doc.id(),
            entries: Vec::new(),
            globals: Vec::new(),
            nulls: Vec::new(),
            values: HashMap::new(),
        }
    }

    pub fn document(&self) -> DocumentId {
        self.document
    }

    /// Verify that `position` is live in `doc` and that `doc` is ours
    fn check(&self, doc: &Document, position: &TreePosition) -> Result<()> {
        if doc.id() != self.document {
            return Err(MarkingError::InvalidTarget(format!(
                "document {} is not tracked by this registry",
                doc.id()
            )));
        }
        if position.document() != self.document {
            return Err(MarkingError::InvalidTarget(format!(
                "{} belongs to another document",
                position
            )));
        }
        doc.check(position)
    }

    fn ensure_unbound(spec: &MarkingSpecification) -> Result<()> {
        match &spec.controlled_structure {
            Some(path) => Err(MarkingError::PathNotEmpty(path.clone())),
            None => Ok(()),
        }
    }

    /// Apply `spec` to `anchor`.
    ///
    /// Leaf anchors are coerced into an `AnnotatableValue`, which is returned;
    /// for them the descendants flag is ignored.
    pub fn add_marking(
        &mut self,
        doc: &Document,
        anchor: impl Into<TreePosition>,
        spec: &MarkingSpecification,
        descendants: bool,
    ) -> Result<Option<AnnotatableValue>> {
        self.add_entry(doc, anchor.into(), spec, descendants, None)
    }

    /// Apply `spec` to a leaf, reading its value as `kind`
    pub fn add_marking_as(
        &mut self,
        doc: &Document,
        anchor: impl Into<TreePosition>,
        spec: &MarkingSpecification,
        kind: ValueKind,
    ) -> Result<AnnotatableValue> {
        let anchor = anchor.into();
        if !anchor.is_leaf() {
            return Err(MarkingError::InvalidTarget(format!(
                "{} is an element, not a leaf value",
                anchor
            )));
        }
        self.add_entry(doc, anchor.clone(), spec, false, Some(kind))?
            .ok_or_else(|| MarkingError::InvalidReference(format!("{} has no value", anchor)))
    }

    fn add_entry(
        &mut self,
        doc: &Document,
        anchor: TreePosition,
        spec: &MarkingSpecification,
        descendants: bool,
        kind: Option<ValueKind>,
    ) -> Result<Option<AnnotatableValue>> {
        Self::ensure_unbound(spec)?;
        self.check(doc, &anchor)?;
        if anchor == TreePosition::Node(doc.root()) {
            return Err(MarkingError::InvalidTarget(
                "the document root cannot be marked directly; add a global marking instead"
                    .to_string(),
            ));
        }

        let descendants = descendants && !anchor.is_leaf();
        if self
            .entries
            .iter()
            .any(|e| e.matches(&anchor, spec, descendants))
        {
            return Err(MarkingError::Duplicate(format!("{} already marks {}", spec, anchor)));
        }

        let value = if anchor.is_leaf() {
            let raw = doc.leaf_value(&anchor)?;
            let value = match (self.values.get(&anchor), kind) {
                (Some(existing), None) if existing.as_str() == raw => existing.clone(),
                _ => AnnotatableValue::coerce(anchor.clone(), raw, kind)?,
            };
            self.values.insert(anchor.clone(), value.clone());
            Some(value)
        } else {
            None
        };

        tracing::debug!("Added marking {} to {} (descendants: {})", spec, anchor, descendants);
        self.entries.push(MarkingEntry {
            anchor,
            spec: spec.unbound(),
            descendants,
        });

        Ok(value)
    }

    /// Apply `spec` to the whole document
    pub fn add_global(&mut self, spec: &MarkingSpecification) -> Result<()> {
        Self::ensure_unbound(spec)?;
        if self.globals.iter().any(|g| g.spec.same_marking(spec)) {
            return Err(MarkingError::Duplicate(format!("{} is already a global marking", spec)));
        }
        tracing::debug!("Added global marking {}", spec);
        self.globals.push(GlobalMarkingEntry { spec: spec.clone() });
        Ok(())
    }

    /// Record a marking that applies to nothing in particular
    pub fn add_null(&mut self, spec: &MarkingSpecification) -> Result<()> {
        Self::ensure_unbound(spec)?;
        if self.nulls.iter().any(|n| n.same_marking(spec)) {
            return Err(MarkingError::Duplicate(format!("{} is already a null marking", spec)));
        }
        self.nulls.push(spec.clone());
        Ok(())
    }

    /// Effective markings at `position`: globals, then inherited, then direct
    pub fn get_markings(
        &self,
        doc: &Document,
        position: &TreePosition,
    ) -> Result<Vec<MarkingSpecification>> {
        self.get_markings_with(doc, position, MarkingQuery::default())
    }

    pub fn get_markings_with(
        &self,
        doc: &Document,
        position: &TreePosition,
        query: MarkingQuery,
    ) -> Result<Vec<MarkingSpecification>> {
        self.check(doc, position)?;

        let mut found: Vec<&MarkingSpecification> = self.globals.iter().map(|g| &g.spec).collect();

        let owner = position.owner();
        let mut chain = doc.ancestors(owner)?;
        chain.reverse();
        if position.is_leaf() {
            chain.push(owner);
        }
        for node in chain {
            let inherited = TreePosition::Node(node);
            found.extend(
                self.entries
                    .iter()
                    .filter(|e| e.descendants && e.anchor == inherited)
                    .map(|e| &e.spec),
            );
        }

        found.extend(
            self.entries
                .iter()
                .filter(|e| e.anchor == *position)
                .map(|e| &e.spec),
        );

        if query.descendants {
            if let TreePosition::Node(node) = position {
                for entry in &self.entries {
                    if entry.anchor != *position && doc.contains(*node, entry.anchor.owner())? {
                        found.push(&entry.spec);
                    }
                }
            }
        }

        if query.null_markings {
            found.extend(self.nulls.iter());
        }

        let mut out: Vec<MarkingSpecification> = Vec::with_capacity(found.len());
        for spec in found {
            if !out.iter().any(|s| s.same_marking(spec)) {
                out.push(spec.clone());
            }
        }
        Ok(out)
    }

    /// True if anything marks `position`, or if `spec` does when given
    pub fn is_marked(
        &self,
        doc: &Document,
        position: &TreePosition,
        spec: Option<&MarkingSpecification>,
        descendants: bool,
    ) -> Result<bool> {
        let query = MarkingQuery {
            descendants,
            null_markings: false,
        };
        let markings = self.get_markings_with(doc, position, query)?;
        Ok(match spec {
            Some(spec) => markings.iter().any(|m| m.same_marking(spec)),
            None => !markings.is_empty(),
        })
    }

    /// Remove the entry applied exactly at `anchor`. Inherited markings are
    /// never touched.
    pub fn remove_marking(
        &mut self,
        anchor: &TreePosition,
        spec: &MarkingSpecification,
        descendants: bool,
    ) -> bool {
        let descendants = descendants && !anchor.is_leaf();
        match self
            .entries
            .iter()
            .position(|e| e.matches(anchor, spec, descendants))
        {
            Some(index) => {
                self.entries.remove(index);
                tracing::debug!("Removed marking {} from {}", spec, anchor);
                true
            }
            None => false,
        }
    }

    pub fn remove_global(&mut self, spec: &MarkingSpecification) -> bool {
        match self.globals.iter().position(|g| g.spec.same_marking(spec)) {
            Some(index) => {
                self.globals.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn remove_null(&mut self, spec: &MarkingSpecification) -> bool {
        match self.nulls.iter().position(|n| n.same_marking(spec)) {
            Some(index) => {
                self.nulls.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every entry applied at `position`, and with `descendants` every
    /// entry anchored beneath it. Returns how many were removed.
    pub fn clear_markings(
        &mut self,
        doc: &Document,
        position: &TreePosition,
        descendants: bool,
    ) -> Result<usize> {
        self.check(doc, position)?;

        let mut doomed = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let hit = match position {
                TreePosition::Node(node) if descendants => doc.contains(*node, entry.anchor.owner())?,
                _ => entry.anchor == *position,
            };
            if hit {
                doomed.push(index);
            }
        }

        for index in doomed.iter().rev() {
            self.entries.remove(*index);
        }
        Ok(doomed.len())
    }

    /// Drop entries and values whose anchors are no longer live in `doc`
    pub fn prune(&mut self, doc: &Document) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| match doc.check(&entry.anchor) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Pruned marking {} from {}: {}", entry.spec, entry.anchor, err);
                false
            }
        });
        self.values.retain(|position, _| doc.check(position).is_ok());
        before - self.entries.len()
    }

    /// Value of a marked leaf as it currently reads in `doc`.
    ///
    /// A leaf rewritten since it was marked is read again with its kind
    /// inferred from the new text.
    pub fn value(&self, doc: &Document, position: &TreePosition) -> Result<Option<AnnotatableValue>> {
        let existing = match self.values.get(position) {
            Some(existing) => existing,
            None => return Ok(None),
        };
        let raw = doc.leaf_value(position)?;
        if existing.as_str() == raw {
            return Ok(Some(existing.clone()));
        }
        Ok(Some(AnnotatableValue::coerce(position.clone(), raw, None)?))
    }

    pub fn global_markings(&self) -> Vec<&MarkingSpecification> {
        self.globals.iter().map(|g| &g.spec).collect()
    }

    pub fn null_markings(&self) -> &[MarkingSpecification] {
        &self.nulls
    }

    /// Entries applied to specific positions, in insertion order
    pub fn field_markings(&self) -> &[MarkingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.globals.len() + self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::NodeRef;
    use crate::markings::TlpColor;
    use crate::values::Primitive;

    struct Fixture {
        doc: Document,
        indicator: NodeRef,
        title: NodeRef,
        observable: NodeRef,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new("stix:STIX_Package");
        let root = doc.root();
        let indicators = doc.append_element(root, "stix:Indicators").unwrap();
        let indicator = doc.append_element(indicators, "stix:Indicator").unwrap();
        doc.set_attribute(indicator, "timestamp", "2015-02-26T21:00:37.454000+00:00")
            .unwrap();
        let title = doc.append_element(indicator, "indicator:Title").unwrap();
        doc.set_text(title, "Gonna Mark This").unwrap();
        let observable = doc.append_element(indicator, "indicator:Observable").unwrap();
        Fixture {
            doc,
            indicator,
            title,
            observable,
        }
    }

    #[test]
    fn test_inheritance_order() {
        let f = fixture();
        let mut registry = MarkingRegistry::new(&f.doc);
        let green = MarkingSpecification::tlp(TlpColor::Green);
        let amber = MarkingSpecification::tlp(TlpColor::Amber);
        let red = MarkingSpecification::tlp(TlpColor::Red);

        registry.add_global(&green).unwrap();
        registry.add_marking(&f.doc, f.indicator, &amber, true).unwrap();
        registry.add_marking(&f.doc, f.observable, &red, false).unwrap();

        let markings = registry
            .get_markings(&f.doc, &TreePosition::Node(f.observable))
            .unwrap();
        assert_eq!(markings, vec![green.clone(), amber.clone(), red]);

        let markings = registry
            .get_markings(&f.doc, &TreePosition::text(f.title))
            .unwrap();
        assert_eq!(markings, vec![green, amber]);
    }

    #[test]
    fn test_root_and_duplicates() {
        let f = fixture();
        let mut registry = MarkingRegistry::new(&f.doc);
        let red = MarkingSpecification::tlp(TlpColor::Red);

        assert!(matches!(
            registry.add_marking(&f.doc, f.doc.root(), &red, true),
            Err(MarkingError::InvalidTarget(_))
        ));

        registry.add_marking(&f.doc, f.indicator, &red, false).unwrap();
        assert!(matches!(
            registry.add_marking(&f.doc, f.indicator, &red, false),
            Err(MarkingError::Duplicate(_))
        ));
        registry.add_marking(&f.doc, f.indicator, &red, true).unwrap();

        registry.add_global(&red).unwrap();
        assert!(matches!(registry.add_global(&red), Err(MarkingError::Duplicate(_))));
        assert_eq!(
            registry.get_markings(&f.doc, &TreePosition::Node(f.doc.root())).unwrap(),
            vec![red]
        );
    }

    #[test]
    fn test_bound_spec_rejected() {
        let f = fixture();
        let mut registry = MarkingRegistry::new(&f.doc);
        let bound = MarkingSpecification::tlp(TlpColor::Red).bound_to("//node() | //@*");

        assert!(matches!(
            registry.add_marking(&f.doc, f.indicator, &bound, false),
            Err(MarkingError::PathNotEmpty(_))
        ));
        assert!(matches!(registry.add_global(&bound), Err(MarkingError::PathNotEmpty(_))));
        assert!(matches!(registry.add_null(&bound), Err(MarkingError::PathNotEmpty(_))));
    }

    #[test]
    fn test_removal_is_exact() {
        let f = fixture();
        let mut registry = MarkingRegistry::new(&f.doc);
        let amber = MarkingSpecification::tlp(TlpColor::Amber);
        registry.add_marking(&f.doc, f.indicator, &amber, true).unwrap();

        let observable = TreePosition::Node(f.observable);
        assert!(!registry.remove_marking(&observable, &amber, false));
        assert!(!registry.remove_marking(&TreePosition::Node(f.indicator), &amber, false));
        assert!(registry.is_marked(&f.doc, &observable, Some(&amber), false).unwrap());

        assert!(registry.remove_marking(&TreePosition::Node(f.indicator), &amber, true));
        assert!(!registry.is_marked(&f.doc, &observable, None, false).unwrap());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_leaf_markings_coerce() {
        let f = fixture();
        let mut registry = MarkingRegistry::new(&f.doc);
        let red = MarkingSpecification::tlp(TlpColor::Red);

        let text = TreePosition::text(f.title);
        let value = registry.add_marking(&f.doc, text.clone(), &red, true).unwrap().unwrap();
        assert_eq!(value, "Gonna Mark This");
        assert!(!registry.field_markings()[0].descendants);
        assert!(registry.remove_marking(&text, &red, true));

        let timestamp = TreePosition::attribute(f.indicator, "timestamp");
        let value = registry.add_marking(&f.doc, timestamp.clone(), &red, false).unwrap().unwrap();
        assert_eq!(value.kind(), ValueKind::DateTime);
        assert_eq!(registry.value(&f.doc, &timestamp).unwrap(), Some(value));

        let bytes = registry
            .add_marking_as(&f.doc, text, &red, ValueKind::Bytes)
            .unwrap();
        assert_eq!(*bytes, Primitive::Bytes(b"Gonna Mark This".to_vec()));

        assert!(matches!(
            registry.add_marking_as(&f.doc, f.title, &red, ValueKind::Text),
            Err(MarkingError::InvalidTarget(_))
        ));
        assert!(matches!(
            registry.add_marking(&f.doc, TreePosition::attribute(f.indicator, "nope"), &red, false),
            Err(MarkingError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_rewritten_leaf_is_coerced_again() {
        let mut f = fixture();
        let mut registry = MarkingRegistry::new(&f.doc);
        let red = MarkingSpecification::tlp(TlpColor::Red);
        let amber = MarkingSpecification::tlp(TlpColor::Amber);
        let text = TreePosition::text(f.title);

        registry.add_marking(&f.doc, text.clone(), &red, false).unwrap();
        f.doc.set_value(&text, "17").unwrap();

        let current = registry.value(&f.doc, &text).unwrap().unwrap();
        assert_eq!(current, "17");
        assert_eq!(*current, Primitive::Int(17));

        let value = registry.add_marking(&f.doc, text.clone(), &amber, false).unwrap().unwrap();
        assert_eq!(value, "17");
        assert_eq!(value.kind(), ValueKind::Integer);
        assert_eq!(registry.value(&f.doc, &text).unwrap(), Some(value));
    }

    #[test]
    fn test_subtree_query_and_clear() {
        let f = fixture();
        let mut registry = MarkingRegistry::new(&f.doc);
        let amber = MarkingSpecification::tlp(TlpColor::Amber);
        let red = MarkingSpecification::tlp(TlpColor::Red);
        let white = MarkingSpecification::tlp(TlpColor::White);

        registry.add_marking(&f.doc, f.observable, &red, false).unwrap();
        registry.add_marking(&f.doc, TreePosition::text(f.title), &amber, false).unwrap();
        registry.add_null(&white).unwrap();

        let indicator = TreePosition::Node(f.indicator);
        assert!(registry.get_markings(&f.doc, &indicator).unwrap().is_empty());
        let all = registry
            .get_markings_with(
                &f.doc,
                &indicator,
                MarkingQuery {
                    descendants: true,
                    null_markings: true,
                },
            )
            .unwrap();
        assert_eq!(all, vec![red, amber, white]);

        assert_eq!(registry.clear_markings(&f.doc, &indicator, false).unwrap(), 0);
        assert_eq!(registry.clear_markings(&f.doc, &indicator, true).unwrap(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_prune_after_detach() {
        let mut f = fixture();
        let mut registry = MarkingRegistry::new(&f.doc);
        let red = MarkingSpecification::tlp(TlpColor::Red);
        let title_text = TreePosition::text(f.title);

        registry.add_marking(&f.doc, f.observable, &red, false).unwrap();
        registry.add_marking(&f.doc, title_text.clone(), &red, false).unwrap();

        f.doc.detach(f.title).unwrap();
        assert_eq!(registry.prune(&f.doc), 1);
        assert!(registry.value(&f.doc, &title_text).unwrap().is_none());
        assert_eq!(registry.field_markings().len(), 1);
    }

    #[test]
    fn test_foreign_document_rejected() {
        let f = fixture();
        let other = Document::new("stix:STIX_Package");
        let mut registry = MarkingRegistry::new(&other);
        let red = MarkingSpecification::tlp(TlpColor::Red);

        assert!(matches!(
            registry.add_marking(&f.doc, f.indicator, &red, false),
            Err(MarkingError::InvalidTarget(_))
        ));
    }
}
