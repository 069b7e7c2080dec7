//! Configuration management for docmark
//!
//! Names the annotation vocabulary written into documents and decides which
//! elements may carry an annotation block of their own.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkingConfig {
    /// Prefix used for marking vocabulary elements
    pub marking_prefix: String,
    /// Namespace URI bound to `marking_prefix`
    pub marking_namespace: String,
    pub handling_element: String,
    pub marking_element: String,
    pub controlled_structure_element: String,
    pub marking_structure_element: String,
    /// Local name of the document header, the fallback annotation host
    pub header_element: String,
    /// Local names of elements permitted to host an annotation block
    pub host_elements: Vec<String>,
    /// Extra prefix bindings declared on the root when a block uses them
    pub namespaces: BTreeMap<String, String>,
    /// Treat the older `//node()` form as a global marking on extract
    pub accept_legacy_global: bool,
}

impl Default for MarkingConfig {
    fn default() -> Self {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(
            "xsi".to_string(),
            "http://www.w3.org/2001/XMLSchema-instance".to_string(),
        );
        namespaces.insert(
            "tlpMarking".to_string(),
            "http://data-marking.mitre.org/extensions/MarkingStructure#TLP-1".to_string(),
        );
        namespaces.insert(
            "simpleMarking".to_string(),
            "http://data-marking.mitre.org/extensions/MarkingStructure#Simple-1".to_string(),
        );

        MarkingConfig {
            marking_prefix: "marking".to_string(),
            marking_namespace: "http://data-marking.mitre.org/Marking-1".to_string(),
            handling_element: "Handling".to_string(),
            marking_element: "Marking".to_string(),
            controlled_structure_element: "Controlled_Structure".to_string(),
            marking_structure_element: "Marking_Structure".to_string(),
            header_element: "STIX_Header".to_string(),
            host_elements: [
                "Indicator",
                "Incident",
                "TTP",
                "Campaign",
                "Threat_Actor",
                "Exploit_Target",
                "Course_Of_Action",
                "Report",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            namespaces,
            accept_legacy_global: true,
        }
    }
}

impl MarkingConfig {
    /// Build a config from `DOCMARK_*` environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        let defaults = MarkingConfig::default();

        MarkingConfig {
            host_elements: env::var("DOCMARK_HOST_ELEMENTS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.host_elements),
            header_element: env::var("DOCMARK_HEADER_ELEMENT")
                .unwrap_or(defaults.header_element),
            accept_legacy_global: env::var("DOCMARK_ACCEPT_LEGACY_GLOBAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.accept_legacy_global),
            ..defaults
        }
    }

    /// Load a config from JSON; absent fields keep their defaults
    pub fn from_json(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Qualified name of a marking vocabulary element
    pub fn marking_name(&self, local: &str) -> String {
        format!("{}:{}", self.marking_prefix, local)
    }

    pub fn is_host_element(&self, local: &str) -> bool {
        self.host_elements.iter().any(|h| h == local)
    }
}
