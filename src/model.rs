//! Architecture document model
//!
//! A lenient, read-only view over an architecture document used by the
//! structural rules. Positions are preserved so findings can point back at
//! the original array index; entries that do not have the expected shape
//! are kept with their fields empty and left for JSON Schema to report.

use serde::Deserialize;
use serde_json::Value;

/// A `connects` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeInterface {
    pub node: String,
    #[serde(default)]
    pub interfaces: Vec<String>,
}

/// The five relationship kinds, discriminated by the single key of
/// `relationship-type`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipKind {
    Interacts { actor: String, nodes: Vec<String> },
    Connects {
        source: NodeInterface,
        destination: NodeInterface,
    },
    DeployedIn { container: String, nodes: Vec<String> },
    ComposedOf { container: String, nodes: Vec<String> },
    Options(Value),
}

impl RelationshipKind {
    pub fn name(&self) -> &'static str {
        match self {
            RelationshipKind::Interacts { .. } => "interacts",
            RelationshipKind::Connects { .. } => "connects",
            RelationshipKind::DeployedIn { .. } => "deployed-in",
            RelationshipKind::ComposedOf { .. } => "composed-of",
            RelationshipKind::Options(_) => "options",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub unique_id: Option<String>,
    /// `unique-id` of each entry in `interfaces`, by position
    pub interfaces: Vec<Option<String>>,
}

impl Node {
    pub fn has_interface(&self, id: &str) -> bool {
        self.interfaces.iter().flatten().any(|i| i == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relationship {
    pub unique_id: Option<String>,
    /// `None` when `relationship-type` is missing or malformed
    pub kind: Option<RelationshipKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Moment {
    pub unique_id: Option<String>,
    pub valid_from: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Architecture {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
    pub current_moment: Option<String>,
    pub moments: Vec<Moment>,
}

impl Architecture {
    pub fn from_value(document: &Value) -> Self {
        Self {
            nodes: entries(document, "nodes").map(parse_node).collect(),
            relationships: entries(document, "relationships")
                .map(parse_relationship)
                .collect(),
            current_moment: string_field(document, "current-moment"),
            moments: entries(document, "moments")
                .map(|m| Moment {
                    unique_id: string_field(m, "unique-id"),
                    valid_from: string_field(m, "valid-from"),
                })
                .collect(),
        }
    }

    /// First node declaring `unique_id`
    pub fn node(&self, unique_id: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|n| n.unique_id.as_deref() == Some(unique_id))
    }
}

fn entries<'a>(document: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    document
        .get(key)
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn parse_node(value: &Value) -> Node {
    Node {
        unique_id: string_field(value, "unique-id"),
        interfaces: entries(value, "interfaces")
            .map(|i| string_field(i, "unique-id"))
            .collect(),
    }
}

fn parse_relationship(value: &Value) -> Relationship {
    let kind = value
        .get("relationship-type")
        .and_then(|t| RelationshipKind::deserialize(t).ok());
    Relationship {
        unique_id: string_field(value, "unique-id"),
        kind,
    }
}
