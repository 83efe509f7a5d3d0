//! Generate script text from a block graph.
//!
//! Generation walks the execution-order chain forward from the unique entry
//! block, rendering each reachable top-level block through its catalog
//! template. Container blocks render their slot children first; chain heads
//! render their transitive `chain_links` closure joined with the `+`
//! continuation. Blocks that are only reachable through containment or as
//! chain followers never produce standalone statements, and blocks not wired
//! to the entry produce nothing at all.
//!
//! Generation is pure and deterministic: the same graph always yields the
//! same text, which is what allows the document layer to recognize its own
//! output coming back through the import pipeline.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::warn;

use crate::catalog;
use crate::model::{BlockGraph, BlockInstance};
use crate::template;

/// Diagnostic emitted instead of text when the graph has no unique entry.
pub const NO_ENTRY_COMMENT: &str = "# blockplot: no entry block — nothing to generate\n";

/// Generate the full script for a graph.
pub fn generate(graph: &BlockGraph) -> String {
    let Some(entry) = graph.entry() else {
        return NO_ENTRY_COMMENT.to_string();
    };

    let mut out = String::with_capacity(256);
    let mut visited: HashSet<String> = HashSet::new();
    let mut cursor = Some(entry.id.clone());
    while let Some(id) = cursor {
        if !visited.insert(id.clone()) {
            warn!(id = %id, "execution chain revisits a block; stopping traversal");
            break;
        }
        let Some(block) = graph.block(&id) else {
            warn!(id = %id, "execution chain references a missing block");
            break;
        };
        if block.is_contained() {
            warn!(id = %id, "execution chain reached a contained block; stopping traversal");
            break;
        }
        let stmt = render_statement(graph, block);
        // An empty render (the entry itself) is skipped, but the traversal
        // continues through its output link.
        if !stmt.is_empty() {
            out.push_str(&stmt);
            out.push('\n');
        }
        cursor = block.connections.output.clone();
    }
    out
}

/// Render one top-level statement: a plain block or a whole chain, with the
/// `assignedTo <- ` prefix applied to the first line.
fn render_statement(graph: &BlockGraph, block: &BlockInstance) -> String {
    let text = if block.chain_links.is_empty() {
        render_block(graph, block)
    } else {
        render_chain(graph, block)
    };
    prefix_assignment(block, text)
}

fn prefix_assignment(block: &BlockInstance, text: String) -> String {
    if text.is_empty() {
        return text;
    }
    match &block.assigned_to {
        Some(name) => format!("{} <- {}", name, text),
        None => text,
    }
}

/// Render a chain head plus the transitive closure of its followers, joined
/// with the `+` continuation marker. All lines after the first are indented.
fn render_chain(graph: &BlockGraph, head: &BlockInstance) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut members: Vec<&BlockInstance> = Vec::new();
    collect_chain(graph, &head.id, &mut seen, &mut members);

    let texts: Vec<String> = members
        .iter()
        .map(|m| render_block(graph, m))
        .filter(|t| !t.is_empty())
        .collect();
    let joined = texts.join(" +\n");

    let mut lines = joined.lines();
    let Some(first) = lines.next() else {
        return String::new();
    };
    let mut out = first.to_string();
    for line in lines {
        out.push_str("\n  ");
        out.push_str(line);
    }
    out
}

/// Depth-first closure over `chain_links`; a follower may itself carry
/// further links. Revisits are guarded.
fn collect_chain<'a>(
    graph: &'a BlockGraph,
    id: &str,
    seen: &mut HashSet<String>,
    out: &mut Vec<&'a BlockInstance>,
) {
    if !seen.insert(id.to_string()) {
        return;
    }
    let Some(block) = graph.block(id) else {
        warn!(id, "chain link references a missing block");
        return;
    };
    out.push(block);
    for link in &block.chain_links {
        collect_chain(graph, link, seen, out);
    }
}

/// Render one block's own text, descending into contained children first.
fn render_block(graph: &BlockGraph, block: &BlockInstance) -> String {
    let mut children_text: IndexMap<String, Vec<String>> = IndexMap::new();
    for (slot, ids) in &block.children {
        let rendered: Vec<String> = ids
            .iter()
            .filter_map(|cid| graph.block(cid))
            .map(|child| render_child(graph, child))
            .filter(|t| !t.is_empty())
            .collect();
        children_text.insert(slot.clone(), rendered);
    }

    let Some(def) = catalog::lookup(&block.block_type) else {
        warn!(block_type = %block.block_type, "no catalog entry for block type");
        return format!("# unknown block type '{}'", block.block_type);
    };
    let text = template::render(def.template, &block.params, &children_text);
    tidy_arguments(&text)
}

/// Contained statements carry their own assignment prefix (e.g. `y <- 1`
/// inside a conditional branch).
fn render_child(graph: &BlockGraph, block: &BlockInstance) -> String {
    let text = render_block(graph, block);
    prefix_assignment(block, text)
}

/// Strip the dangling argument-list commas left behind by omitted optional
/// parameters, e.g. `geom_point(size = 2, )` → `geom_point(size = 2)`.
fn tidy_arguments(text: &str) -> String {
    let mut out = text.to_string();
    loop {
        let next = out.replace(", )", ")").replace("(, ", "(");
        if next == out {
            return out;
        }
        out = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tidy_strips_trailing_and_leading_commas() {
        assert_eq!(tidy_arguments("f(a, )"), "f(a)");
        assert_eq!(tidy_arguments("f(, b)"), "f(b)");
        assert_eq!(tidy_arguments("f(a, b = 2, )"), "f(a, b = 2)");
        assert_eq!(tidy_arguments("f()"), "f()");
        assert_eq!(tidy_arguments("f(, )"), "f()");
    }
}
