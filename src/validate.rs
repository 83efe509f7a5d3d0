//! Structural validation of a block graph.
//!
//! Mutating commands keep the graph consistent on their own; this validator
//! exists so a surface (or a test) can ask for every violation explicitly.
//! Issues are reported, never auto-repaired.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::model::BlockGraph;

/// One structural-consistency violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    /// Two blocks share an id.
    DuplicateId { id: String },
    /// A connection, containment or chain field references a missing block.
    BrokenConnection {
        id: String,
        field: &'static str,
        target: String,
    },
    /// An id is the `output` (or `input`) target of more than one block.
    ConnectionConflict { id: String, field: &'static str },
    /// A child listed in `children` does not point back at its container.
    ContainmentMismatch {
        parent: String,
        slot: String,
        child: String,
    },
    /// A contained block still carries execution-order connections.
    ContainedWithConnections { id: String },
    /// A chain follower carries execution-order connections or is contained.
    ChainFollowerAttached { id: String },
    /// A block is listed as a follower of two chain heads.
    SharedChainFollower { id: String },
    /// A contained or follower block carries chain links of its own
    /// while sitting inside a container.
    ChainLinksOnContained { id: String },
    /// No entry block exists.
    MissingEntry,
    /// More than one entry block exists.
    MultipleEntries { count: usize },
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::DuplicateId { id } => write!(f, "duplicate block id '{}'", id),
            GraphIssue::BrokenConnection { id, field, target } => {
                write!(f, "block '{}' {} references missing block '{}'", id, field, target)
            }
            GraphIssue::ConnectionConflict { id, field } => {
                write!(f, "block '{}' is the {} target of more than one block", id, field)
            }
            GraphIssue::ContainmentMismatch { parent, slot, child } => write!(
                f,
                "child '{}' of '{}' slot '{}' does not point back at its container",
                child, parent, slot
            ),
            GraphIssue::ContainedWithConnections { id } => {
                write!(f, "contained block '{}' carries execution-order connections", id)
            }
            GraphIssue::ChainFollowerAttached { id } => {
                write!(f, "chain follower '{}' is connected or contained", id)
            }
            GraphIssue::SharedChainFollower { id } => {
                write!(f, "block '{}' is a follower of more than one chain head", id)
            }
            GraphIssue::ChainLinksOnContained { id } => {
                write!(f, "contained block '{}' carries chain links", id)
            }
            GraphIssue::MissingEntry => write!(f, "graph has no entry block"),
            GraphIssue::MultipleEntries { count } => {
                write!(f, "graph has {} entry blocks; exactly one is required", count)
            }
        }
    }
}

/// Check every structural invariant, returning all violations found.
pub fn validate(graph: &BlockGraph) -> Vec<GraphIssue> {
    let mut issues = Vec::new();

    // Unique ids.
    let mut seen: HashSet<&str> = HashSet::new();
    for block in &graph.blocks {
        if !seen.insert(block.id.as_str()) {
            issues.push(GraphIssue::DuplicateId {
                id: block.id.clone(),
            });
        }
    }

    // Entry multiplicity.
    let entries = graph.blocks.iter().filter(|b| b.is_entry()).count();
    match entries {
        0 => issues.push(GraphIssue::MissingEntry),
        1 => {}
        count => issues.push(GraphIssue::MultipleEntries { count }),
    }

    // Connections: existing targets, at most one claimant per endpoint.
    let mut output_targets: HashMap<&str, usize> = HashMap::new();
    let mut input_targets: HashMap<&str, usize> = HashMap::new();
    for block in &graph.blocks {
        for (field, target) in [
            ("output", &block.connections.output),
            ("input", &block.connections.input),
        ] {
            if let Some(target) = target {
                if !graph.contains(target) {
                    issues.push(GraphIssue::BrokenConnection {
                        id: block.id.clone(),
                        field,
                        target: target.clone(),
                    });
                }
                let counter = if field == "output" {
                    &mut output_targets
                } else {
                    &mut input_targets
                };
                *counter.entry(target.as_str()).or_insert(0) += 1;
            }
        }
    }
    for (target, count) in output_targets {
        if count > 1 {
            issues.push(GraphIssue::ConnectionConflict {
                id: target.to_string(),
                field: "output",
            });
        }
    }
    for (target, count) in input_targets {
        if count > 1 {
            issues.push(GraphIssue::ConnectionConflict {
                id: target.to_string(),
                field: "input",
            });
        }
    }

    // Containment: children lists and parent pointers must agree, and a
    // contained block never carries connections.
    for block in &graph.blocks {
        for (slot, ids) in &block.children {
            for child_id in ids {
                match graph.block(child_id) {
                    None => issues.push(GraphIssue::BrokenConnection {
                        id: block.id.clone(),
                        field: "children",
                        target: child_id.clone(),
                    }),
                    Some(child) => {
                        let points_back = child.parent_id.as_deref() == Some(block.id.as_str())
                            && child.slot_name.as_deref() == Some(slot.as_str());
                        if !points_back {
                            issues.push(GraphIssue::ContainmentMismatch {
                                parent: block.id.clone(),
                                slot: slot.clone(),
                                child: child_id.clone(),
                            });
                        }
                    }
                }
            }
        }
        if let Some(parent_id) = &block.parent_id {
            match graph.block(parent_id) {
                None => issues.push(GraphIssue::BrokenConnection {
                    id: block.id.clone(),
                    field: "parentId",
                    target: parent_id.clone(),
                }),
                Some(parent) => {
                    let slot = block.slot_name.as_deref().unwrap_or("");
                    if !parent.slot_children(slot).contains(&block.id) {
                        issues.push(GraphIssue::ContainmentMismatch {
                            parent: parent_id.clone(),
                            slot: slot.to_string(),
                            child: block.id.clone(),
                        });
                    }
                }
            }
            if !block.connections.is_empty() {
                issues.push(GraphIssue::ContainedWithConnections {
                    id: block.id.clone(),
                });
            }
            if !block.chain_links.is_empty() {
                issues.push(GraphIssue::ChainLinksOnContained {
                    id: block.id.clone(),
                });
            }
        }
    }

    // Chains: followers exist, belong to one head only, and are neither
    // connected nor contained.
    let mut follower_heads: HashMap<&str, usize> = HashMap::new();
    for block in &graph.blocks {
        for link in &block.chain_links {
            *follower_heads.entry(link.as_str()).or_insert(0) += 1;
            match graph.block(link) {
                None => issues.push(GraphIssue::BrokenConnection {
                    id: block.id.clone(),
                    field: "chainLinks",
                    target: link.clone(),
                }),
                Some(follower) => {
                    if !follower.connections.is_empty() || follower.is_contained() {
                        issues.push(GraphIssue::ChainFollowerAttached {
                            id: follower.id.clone(),
                        });
                    }
                }
            }
        }
    }
    for (id, count) in follower_heads {
        if count > 1 {
            issues.push(GraphIssue::SharedChainFollower { id: id.to_string() });
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockInstance, Position};

    #[test]
    fn a_fresh_document_graph_is_clean() {
        let graph = BlockGraph::with_entry(Position::default());
        assert!(validate(&graph).is_empty());
    }

    #[test]
    fn broken_connection_is_reported_not_repaired() {
        let mut graph = BlockGraph::with_entry(Position::default());
        let id = graph.allocate_id();
        let mut b = BlockInstance::new(&id, "geom_point");
        b.connections.output = Some("b999".to_string());
        graph.blocks.push(b);

        let issues = validate(&graph);
        assert!(issues.iter().any(|i| matches!(
            i,
            GraphIssue::BrokenConnection { field: "output", .. }
        )));
        // The graph itself is untouched.
        assert_eq!(
            graph.block(&id).unwrap().connections.output.as_deref(),
            Some("b999")
        );
    }

    #[test]
    fn shared_follower_and_attached_follower_are_reported() {
        let mut graph = BlockGraph::with_entry(Position::default());
        let follower = graph.allocate_id();
        let mut f = BlockInstance::new(&follower, "geom_point");
        f.connections.input = Some("b1".to_string());
        graph.blocks.push(f);
        for _ in 0..2 {
            let head = graph.allocate_id();
            let mut h = BlockInstance::new(&head, "ggplot");
            h.chain_links.push(follower.clone());
            graph.blocks.push(h);
        }

        let issues = validate(&graph);
        assert!(issues
            .iter()
            .any(|i| matches!(i, GraphIssue::SharedChainFollower { id } if *id == follower)));
        assert!(issues
            .iter()
            .any(|i| matches!(i, GraphIssue::ChainFollowerAttached { id } if *id == follower)));
    }
}
