//! Configured model entries and role routing tables.

use std::collections::BTreeMap;

/// One `models:` entry from the router document.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub name: String,
    /// Backend kind: `"null"` for the deterministic stub.
    pub kind: String,
    pub capabilities: Vec<String>,
    pub params: BTreeMap<String, serde_yaml::Value>,
}

/// Role name to model name mapping from the router document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingSpec {
    pub mapping: BTreeMap<String, String>,
}
