//! Knowledge graph data model
//!
//! Nodes are read-only snapshots of records held by the graph store.
//! Every node carries its taxonomy level (`NodeLabel`) and a flat
//! attribute map (opening hours, location, phone, airline code, ...).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable graph identifier (the store's internal node id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId(id)
    }
}

/// Taxonomy level of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeLabel {
    /// Top-level category (e.g. dining)
    Genre,
    /// Second-level category (e.g. fast food)
    SubGenre,
    /// Concrete facility or service
    Instance,
    /// Any other label the store knows about (root facility, airlines, ...)
    Other(String),
}

impl NodeLabel {
    pub fn as_str(&self) -> &str {
        match self {
            NodeLabel::Genre => "Genre",
            NodeLabel::SubGenre => "SubGenre",
            NodeLabel::Instance => "Instance",
            NodeLabel::Other(label) => label,
        }
    }

    /// Whether the label names a taxonomy category rather than a concrete entity
    pub fn is_category(&self) -> bool {
        matches!(self, NodeLabel::Genre | NodeLabel::SubGenre)
    }
}

impl From<String> for NodeLabel {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Genre" => NodeLabel::Genre,
            "SubGenre" => NodeLabel::SubGenre,
            "Instance" => NodeLabel::Instance,
            _ => NodeLabel::Other(label),
        }
    }
}

impl From<&str> for NodeLabel {
    fn from(label: &str) -> Self {
        NodeLabel::from(label.to_string())
    }
}

impl From<NodeLabel> for String {
    fn from(label: NodeLabel) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node record returned by the graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Store identifier
    pub id: EntityId,

    /// Display name
    pub name: String,

    /// Taxonomy level
    pub label: NodeLabel,

    /// Named attributes, iterated in key order
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl GraphNode {
    pub fn new(id: i64, name: impl Into<String>, label: impl Into<NodeLabel>) -> Self {
        Self {
            id: EntityId(id),
            name: name.into(),
            label: label.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute insertion
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
