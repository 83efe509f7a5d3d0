//! Canvas placement for imported graphs.
//!
//! The placement is a best-effort reading aid, never semantically
//! load-bearing: top-level statements run down a left column, chain
//! followers run down a separate right column, container children are
//! indented under their container. The algorithm is fully deterministic
//! and uses no randomness; a final pass nudges any block that would
//! overlap the block placed above it in its column.

use std::collections::HashMap;

use crate::model::{BlockGraph, Position};

pub const LEFT_COLUMN_X: i32 = 40;
pub const CHAIN_COLUMN_X: i32 = 360;
pub const CHILD_INDENT: i32 = 40;
pub const ROW_STEP: i32 = 90;
pub const TOP_Y: i32 = 40;

/// Assign positions to every block of a freshly imported graph.
pub fn assign(graph: &mut BlockGraph) {
    let mut placements: Vec<(String, Position)> = Vec::new();
    let mut left_y = TOP_Y;
    let mut right_y = TOP_Y;

    let top_ids: Vec<String> = graph
        .top_level_blocks()
        .iter()
        .map(|b| b.id.clone())
        .collect();
    for id in &top_ids {
        place_block(graph, id, LEFT_COLUMN_X, &mut left_y, &mut right_y, &mut placements);
    }

    for (id, pos) in placements {
        if let Some(block) = graph.block_mut(&id) {
            block.position = pos;
        }
    }
    nudge_overlaps(graph);
}

fn place_block(
    graph: &BlockGraph,
    id: &str,
    x: i32,
    column_y: &mut i32,
    right_y: &mut i32,
    placements: &mut Vec<(String, Position)>,
) {
    let Some(block) = graph.block(id) else { return };
    let row_y = *column_y;
    placements.push((id.to_string(), Position::new(x, row_y)));
    *column_y += ROW_STEP;

    // Chain followers go down the right column, starting no higher than the
    // head's own row.
    if !block.chain_links.is_empty() {
        let mut y = (*right_y).max(row_y);
        for follower_id in chain_closure(graph, id) {
            placements.push((follower_id, Position::new(CHAIN_COLUMN_X, y)));
            y += ROW_STEP;
        }
        *right_y = y;
    }

    // Container children are indented one step under their container and
    // consume rows of the same vertical cursor.
    for ids in block.children.values() {
        for child_id in ids {
            place_block(graph, child_id, x + CHILD_INDENT, column_y, right_y, placements);
        }
    }
}

/// Transitive follower closure of a chain head, head excluded, in chain
/// order with revisit guarding.
fn chain_closure(graph: &BlockGraph, head_id: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    seen.insert(head_id.to_string());
    let mut out = Vec::new();
    let mut stack: Vec<String> = graph
        .block(head_id)
        .map(|b| b.chain_links.iter().rev().cloned().collect())
        .unwrap_or_default();
    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(block) = graph.block(&id) {
            for link in block.chain_links.iter().rev() {
                stack.push(link.clone());
            }
        }
        out.push(id);
    }
    out
}

/// Push any block down that would overlap the block placed above it in the
/// same column.
fn nudge_overlaps(graph: &mut BlockGraph) {
    let mut columns: HashMap<i32, Vec<usize>> = HashMap::new();
    for (idx, block) in graph.blocks.iter().enumerate() {
        columns.entry(block.position.x).or_default().push(idx);
    }
    for indices in columns.values_mut() {
        indices.sort_by_key(|&i| (graph.blocks[i].position.y, i));
        let mut floor: Option<i32> = None;
        for &i in indices.iter() {
            let y = graph.blocks[i].position.y;
            let adjusted = match floor {
                Some(f) if y < f + ROW_STEP => f + ROW_STEP,
                _ => y,
            };
            graph.blocks[i].position.y = adjusted;
            floor = Some(adjusted);
        }
    }
}
