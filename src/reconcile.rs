//! Merge a freshly imported candidate graph onto the live graph.
//!
//! Re-importing text must not discard user state: block identities and
//! canvas positions live on the previous graph and have no counterpart in
//! the parse forest. Reconciliation therefore matches every candidate block
//! against the not-yet-consumed previous blocks by type, parameter
//! similarity and document-order locality, and lets the best match donate
//! its identity.
//!
//! A donor contributes its id and position; everything the text itself
//! expresses — parameters, statement wiring, containment, chain links,
//! assignments — comes from the candidate, with candidate ids rewritten
//! through the donor mapping so the merged graph stays internally
//! consistent. Re-importing unchanged text is therefore a fixed point,
//! while an inserted statement enters as a new instance without orphaning
//! its neighbors.
//!
//! The match is a heuristic, not a guaranteed-correct diff; equal scores
//! fall back to the earliest previous block in document order.

use std::collections::HashMap;

use crate::model::BlockGraph;

/// Score awarded for a matching block type. A match below this threshold
/// never donates identity, which also makes a cross-type donation
/// impossible.
const TYPE_MATCH_SCORE: i64 = 100;
/// Score awarded when the whole parameter map is identical.
const PARAMS_IDENTICAL_SCORE: i64 = 50;
/// Score awarded per individually equal parameter otherwise.
const PARAM_EQUAL_SCORE: i64 = 5;

/// Merge `candidate` onto `previous`, preserving identity where a
/// sufficiently similar previous block exists. The merged block order is
/// the candidate's document order; previous blocks without a counterpart
/// in the candidate are dropped.
pub fn reconcile(previous: &BlockGraph, candidate: &BlockGraph) -> BlockGraph {
    // The candidate allocated its ids independently of the live graph, so
    // shift them into an unused range first; otherwise an unmatched
    // candidate could collide with a donor's id.
    let candidate = renumber(candidate, previous.next_id);

    // Pass 1: pick an identity donor for every candidate block.
    let mut consumed = vec![false; previous.blocks.len()];
    let mut donors: Vec<Option<usize>> = Vec::with_capacity(candidate.blocks.len());
    for (candidate_index, cand) in candidate.blocks.iter().enumerate() {
        let mut best: Option<(usize, i64)> = None;
        for (previous_index, prev) in previous.blocks.iter().enumerate() {
            if consumed[previous_index] || prev.block_type != cand.block_type {
                continue;
            }
            let mut score = TYPE_MATCH_SCORE;
            if prev.params == cand.params {
                score += PARAMS_IDENTICAL_SCORE;
            } else {
                let equal = cand
                    .params
                    .iter()
                    .filter(|(k, v)| prev.params.get(*k) == Some(v))
                    .count();
                score += PARAM_EQUAL_SCORE * equal as i64;
            }
            score -= (candidate_index as i64 - previous_index as i64).abs();
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((previous_index, score));
            }
        }
        let donor = best
            .filter(|(_, score)| *score >= TYPE_MATCH_SCORE)
            .map(|(previous_index, _)| {
                consumed[previous_index] = true;
                previous_index
            });
        donors.push(donor);
    }

    // Candidate id → merged id, for rewriting references.
    let mut mapping: HashMap<String, String> = HashMap::new();
    for (cand, donor) in candidate.blocks.iter().zip(&donors) {
        if let Some(previous_index) = donor {
            mapping.insert(cand.id.clone(), previous.blocks[*previous_index].id.clone());
        }
    }

    // Pass 2: assemble the merged graph in candidate order.
    let mut merged = BlockGraph {
        blocks: Vec::with_capacity(candidate.blocks.len()),
        // The renumbered candidate's allocator is already past every id on
        // either side.
        next_id: candidate.next_id,
    };
    for (cand, donor) in candidate.blocks.iter().zip(&donors) {
        let mut block = cand.clone();
        if let Some(previous_index) = donor {
            let donor = &previous.blocks[*previous_index];
            block.id = donor.id.clone();
            block.position = donor.position;
        }
        let remap = |id: &mut String| {
            if let Some(mapped) = mapping.get(id.as_str()) {
                *id = mapped.clone();
            }
        };
        if let Some(parent) = &mut block.parent_id {
            remap(parent);
        }
        if let Some(input) = &mut block.connections.input {
            remap(input);
        }
        if let Some(output) = &mut block.connections.output {
            remap(output);
        }
        for ids in block.children.values_mut() {
            for id in ids {
                remap(id);
            }
        }
        for id in &mut block.chain_links {
            remap(id);
        }
        merged.blocks.push(block);
    }

    merged
}

/// Rewrite every id of a graph into the range starting past `offset`,
/// keeping all internal references consistent.
fn renumber(graph: &BlockGraph, offset: u64) -> BlockGraph {
    let mut renamed = graph.clone();
    let mut mapping: HashMap<String, String> = HashMap::new();
    let mut next = offset;
    for block in &graph.blocks {
        next += 1;
        mapping.insert(block.id.clone(), format!("b{}", next));
    }
    let rename = |id: &mut String| {
        if let Some(new_id) = mapping.get(id.as_str()) {
            *id = new_id.clone();
        }
    };
    for block in &mut renamed.blocks {
        rename(&mut block.id);
        if let Some(parent) = &mut block.parent_id {
            rename(parent);
        }
        if let Some(input) = &mut block.connections.input {
            rename(input);
        }
        if let Some(output) = &mut block.connections.output {
            rename(output);
        }
        for ids in block.children.values_mut() {
            for id in ids {
                rename(id);
            }
        }
        for id in &mut block.chain_links {
            rename(id);
        }
    }
    renamed.next_id = next;
    renamed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockInstance, Position};

    fn block(graph: &mut BlockGraph, block_type: &str, params: &[(&str, &str)]) -> String {
        let id = graph.allocate_id();
        let mut b = BlockInstance::new(&id, block_type);
        for (k, v) in params {
            b.params.insert(k.to_string(), v.to_string());
        }
        graph.blocks.push(b);
        id
    }

    #[test]
    fn identical_graphs_merge_to_the_previous_graph() {
        let mut previous = BlockGraph::new();
        block(&mut previous, "entry", &[]);
        let id = block(&mut previous, "geom_point", &[("size", "2")]);
        previous.block_mut(&id).unwrap().position = Position::new(7, 13);

        let mut candidate = BlockGraph::new();
        block(&mut candidate, "entry", &[]);
        block(&mut candidate, "geom_point", &[("size", "2")]);

        let merged = reconcile(&previous, &candidate);
        assert_eq!(merged.blocks, previous.blocks);
    }

    #[test]
    fn a_donor_is_consumed_at_most_once() {
        let mut previous = BlockGraph::new();
        let only = block(&mut previous, "geom_point", &[]);

        let mut candidate = BlockGraph::new();
        block(&mut candidate, "geom_point", &[]);
        block(&mut candidate, "geom_point", &[]);

        let merged = reconcile(&previous, &candidate);
        assert_eq!(merged.blocks[0].id, only);
        // The second candidate found no free donor and entered as a new
        // instance with an id of its own.
        assert_ne!(merged.blocks[1].id, only);
        assert_ne!(merged.blocks[1].id, merged.blocks[0].id);
    }

    #[test]
    fn types_never_cross_match() {
        let mut previous = BlockGraph::new();
        let prev_id = block(&mut previous, "geom_line", &[("colour", "\"red\"")]);

        let mut candidate = BlockGraph::new();
        block(&mut candidate, "geom_point", &[("colour", "\"red\"")]);

        let merged = reconcile(&previous, &candidate);
        assert_eq!(merged.blocks[0].block_type, "geom_point");
        assert_ne!(merged.blocks[0].id, prev_id);
    }

    #[test]
    fn distant_blocks_can_fall_below_the_threshold() {
        // Same type, no equal params, and far apart in document order:
        // the locality penalty pushes the score under 100.
        let mut previous = BlockGraph::new();
        for _ in 0..4 {
            block(&mut previous, "expr", &[("code", "old")]);
        }
        let far = block(&mut previous, "geom_point", &[("size", "1")]);

        let mut candidate = BlockGraph::new();
        block(&mut candidate, "geom_point", &[("size", "9")]);

        let merged = reconcile(&previous, &candidate);
        assert_ne!(merged.blocks[0].id, far);
    }

    #[test]
    fn references_are_rewritten_through_the_donor_mapping() {
        let mut previous = BlockGraph::new();
        let prev_entry = block(&mut previous, "entry", &[]);

        let mut candidate = BlockGraph::new();
        let cand_entry = block(&mut candidate, "entry", &[]);
        let cand_stmt = block(&mut candidate, "theme_minimal", &[]);
        candidate.block_mut(&cand_entry).unwrap().connections.output = Some(cand_stmt.clone());
        candidate.block_mut(&cand_stmt).unwrap().connections.input = Some(cand_entry.clone());

        let merged = reconcile(&previous, &candidate);
        let entry = merged.block(&prev_entry).unwrap();
        let stmt = &merged.blocks[1];
        // The kept statement points at the donated entry id, not at the
        // candidate's own entry id.
        assert_eq!(entry.connections.output.as_deref(), Some(stmt.id.as_str()));
        assert_eq!(stmt.connections.input.as_deref(), Some(prev_entry.as_str()));
        assert!(crate::validate::validate(&merged).is_empty());
    }

    #[test]
    fn candidate_ids_never_collide_with_donor_ids() {
        let mut previous = BlockGraph::new();
        block(&mut previous, "entry", &[]);
        block(&mut previous, "geom_line", &[]);

        // The candidate's second block reuses the id the previous graph gave
        // its geom_line; the merge must keep ids unique anyway.
        let mut candidate = BlockGraph::new();
        block(&mut candidate, "entry", &[]);
        block(&mut candidate, "geom_point", &[]);

        let merged = reconcile(&previous, &candidate);
        let mut ids: Vec<&str> = merged.blocks.iter().map(|b| b.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), merged.blocks.len());
    }
}
