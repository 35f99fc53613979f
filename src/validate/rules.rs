//! Structural rules
//!
//! Invariants over a whole architecture that JSON Schema cannot express:
//! identifier uniqueness, `connects` endpoints naming real nodes and
//! interfaces, relationships naming real nodes, and timeline ordering.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

use super::diagnostics::{pointer_push, Diagnostic};
use crate::model::{Architecture, NodeInterface, RelationshipKind};

/// A check over a parsed architecture
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, architecture: &Architecture) -> Vec<Diagnostic>;
}

/// Every rule applied to architectures
pub fn standard_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(UniqueIds),
        Box::new(InterfaceExistence),
        Box::new(ReferencedNodes),
        Box::new(TimelineOrder),
    ]
}

// =============================================================================
// Uniqueness
// =============================================================================

/// `unique-id` values are unique across nodes, interfaces and relationships.
/// Only the second and later occurrences are reported.
pub struct UniqueIds;

impl Rule for UniqueIds {
    fn name(&self) -> &'static str {
        "unique-ids"
    }

    fn check(&self, architecture: &Architecture) -> Vec<Diagnostic> {
        let mut occurrences: Vec<(&str, String)> = Vec::new();

        for (i, node) in architecture.nodes.iter().enumerate() {
            let node_path = pointer_push("/nodes", i);
            if let Some(id) = &node.unique_id {
                occurrences.push((id.as_str(), pointer_push(&node_path, "unique-id")));
            }
            for (j, interface) in node.interfaces.iter().enumerate() {
                if let Some(id) = interface {
                    let path = pointer_push(&pointer_push(&node_path, "interfaces"), j);
                    occurrences.push((id.as_str(), pointer_push(&path, "unique-id")));
                }
            }
        }
        for (k, relationship) in architecture.relationships.iter().enumerate() {
            if let Some(id) = &relationship.unique_id {
                let path = pointer_push("/relationships", k);
                occurrences.push((id.as_str(), pointer_push(&path, "unique-id")));
            }
        }

        let mut first_seen: HashMap<&str, &str> = HashMap::new();
        let mut diagnostics = Vec::new();
        for (id, path) in &occurrences {
            match first_seen.get(*id) {
                Some(first) => diagnostics.push(Diagnostic::error(
                    "duplicate-unique-id",
                    format!("unique-id '{id}' is already declared at {first}"),
                    path.clone(),
                )),
                None => {
                    first_seen.insert(*id, path.as_str());
                }
            }
        }
        diagnostics
    }
}

// =============================================================================
// Interface existence
// =============================================================================

/// `connects` endpoints reference an existing node and interfaces that node declares
pub struct InterfaceExistence;

impl Rule for InterfaceExistence {
    fn name(&self) -> &'static str {
        "connects-interfaces"
    }

    fn check(&self, architecture: &Architecture) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (k, relationship) in architecture.relationships.iter().enumerate() {
            let Some(RelationshipKind::Connects { source, destination }) = &relationship.kind else {
                continue;
            };
            let base = format!("/relationships/{k}/relationship-type/connects");
            for (end, endpoint) in [("source", source), ("destination", destination)] {
                check_endpoint(architecture, endpoint, &pointer_push(&base, end), &mut diagnostics);
            }
        }
        diagnostics
    }
}

fn check_endpoint(
    architecture: &Architecture,
    endpoint: &NodeInterface,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(node) = architecture.node(&endpoint.node) else {
        diagnostics.push(Diagnostic::error(
            "connects-unknown-node",
            format!("node '{}' does not exist", endpoint.node),
            pointer_push(path, "node"),
        ));
        return;
    };

    for (j, interface) in endpoint.interfaces.iter().enumerate() {
        if !node.has_interface(interface) {
            diagnostics.push(Diagnostic::error(
                "connects-unknown-interface",
                format!("node '{}' does not declare interface '{interface}'", endpoint.node),
                pointer_push(&pointer_push(path, "interfaces"), j),
            ));
        }
    }
}

// =============================================================================
// Referenced nodes
// =============================================================================

/// `interacts`, `deployed-in` and `composed-of` name nodes that exist
pub struct ReferencedNodes;

impl Rule for ReferencedNodes {
    fn name(&self) -> &'static str {
        "referenced-nodes"
    }

    fn check(&self, architecture: &Architecture) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (k, relationship) in architecture.relationships.iter().enumerate() {
            let Some(kind) = &relationship.kind else { continue };
            let (anchor_key, anchor, nodes) = match kind {
                RelationshipKind::Interacts { actor, nodes } => ("actor", actor, nodes),
                RelationshipKind::DeployedIn { container, nodes }
                | RelationshipKind::ComposedOf { container, nodes } => ("container", container, nodes),
                RelationshipKind::Connects { .. } | RelationshipKind::Options(_) => continue,
            };

            let base = pointer_push(&format!("/relationships/{k}/relationship-type"), kind.name());
            let mut referenced = vec![(anchor.as_str(), pointer_push(&base, anchor_key))];
            let nodes_path = pointer_push(&base, "nodes");
            referenced.extend(
                nodes
                    .iter()
                    .enumerate()
                    .map(|(j, n)| (n.as_str(), pointer_push(&nodes_path, j))),
            );

            for (id, path) in referenced {
                if architecture.node(id).is_none() {
                    diagnostics.push(Diagnostic::error(
                        "unknown-node-reference",
                        format!("{} relationship references node '{id}' which does not exist", kind.name()),
                        path,
                    ));
                }
            }
        }
        diagnostics
    }
}

// =============================================================================
// Timeline ordering
// =============================================================================

/// Moments and the current moment of a timeline are consistent
pub struct TimelineOrder;

impl Rule for TimelineOrder {
    fn name(&self) -> &'static str {
        "timeline-order"
    }

    fn check(&self, architecture: &Architecture) -> Vec<Diagnostic> {
        let moments = &architecture.moments;
        if moments.is_empty() {
            return Vec::new();
        }

        let mut diagnostics = Vec::new();
        match &architecture.current_moment {
            None => diagnostics.push(Diagnostic::error(
                "timeline-missing-current-moment",
                "current-moment must be set when moments are declared",
                "/current-moment",
            )),
            Some(current) if !moments.iter().any(|m| m.unique_id.as_ref() == Some(current)) => {
                diagnostics.push(Diagnostic::error(
                    "timeline-unknown-current-moment",
                    format!("current-moment '{current}' is not one of the declared moments"),
                    "/current-moment",
                ));
            }
            Some(_) => {}
        }

        let has_valid_from = moments.iter().any(|m| m.valid_from.is_some());
        if !has_valid_from {
            let last = moments.last().and_then(|m| m.unique_id.as_deref());
            if let (Some(current), Some(last)) = (architecture.current_moment.as_deref(), last) {
                let known = moments.iter().any(|m| m.unique_id.as_deref() == Some(current));
                if known && current != last {
                    diagnostics.push(Diagnostic::error(
                        "timeline-current-moment-not-latest",
                        format!(
                            "current-moment '{current}' must be the last moment ('{last}') when no moment declares valid-from"
                        ),
                        "/current-moment",
                    ));
                }
            }
            return diagnostics;
        }

        let mut previous: Option<(DateTime<Utc>, &str)> = None;
        for (i, moment) in moments.iter().enumerate() {
            let Some(raw) = moment.valid_from.as_deref() else { continue };
            let path = format!("/moments/{i}/valid-from");
            let Some(timestamp) = parse_timestamp(raw) else {
                diagnostics.push(Diagnostic::error(
                    "timeline-invalid-valid-from",
                    format!("valid-from '{raw}' is not an RFC 3339 timestamp or YYYY-MM-DD date"),
                    path,
                ));
                continue;
            };
            if let Some((previous_time, previous_raw)) = previous {
                if timestamp < previous_time {
                    diagnostics.push(Diagnostic::error(
                        "timeline-out-of-order",
                        format!("valid-from '{raw}' is earlier than the previous moment's valid-from '{previous_raw}'"),
                        path,
                    ));
                    continue;
                }
            }
            previous = Some((timestamp, raw));
        }
        diagnostics
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
