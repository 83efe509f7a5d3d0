//! Build a candidate block graph from an upstream parse forest.
//!
//! The importer is the text → graph half of the synchronization pipeline.
//! It consumes the ordered statement forest described in [`crate::ast`],
//! reassembles `+`-chains and loop/conditional containers into the same
//! shape the generator emits, wires the execution-order connections in
//! document order, and assigns a readable 2-D layout.
//!
//! Per-statement failures degrade instead of failing the import: a call the
//! catalog does not know becomes a generic function-call block that
//! round-trips through its literal argument text, and an unrecognizable
//! expression shape surfaces the [`crate::ast::UNPARSEABLE`] sentinel.

use tracing::debug;

use crate::ast::{self, CallArg, ParseNode, args_text, deparse};
use crate::catalog::{self, BlockDefinition, CALL_TYPE, DATA_TYPE, EXPR_TYPE};
use crate::layout;
use crate::model::{BlockGraph, BlockInstance, DATA_PLACEHOLDER, ENTRY_TYPE};

/// Assignment operators recognized at statement level.
const ASSIGN_OPS: &[&str] = &["<-", "<<-", "="];

/// Convert a parse forest into a candidate graph.
///
/// The candidate always contains a fresh entry block followed by one
/// top-level block per statement, connected in document order.
pub fn import(forest: &[ParseNode]) -> BlockGraph {
    let mut graph = BlockGraph::new();
    let entry_id = graph.allocate_id();
    graph.blocks.push(BlockInstance::new(entry_id, ENTRY_TYPE));

    for stmt in forest {
        convert_statement(&mut graph, stmt);
    }

    wire_execution_order(&mut graph);
    layout::assign(&mut graph);
    graph
}

// ────────────────────────────────────────────────────────────────────────────
// Statement conversion
// ────────────────────────────────────────────────────────────────────────────

/// Convert one top-level statement, returning the id of the directly
/// produced block (containers return themselves, chains their head).
fn convert_statement(graph: &mut BlockGraph, stmt: &ParseNode) -> String {
    if let ParseNode::Call { function, args } = stmt {
        if ASSIGN_OPS.contains(&function.as_str()) && args.len() == 2 {
            return convert_assignment(graph, &args[0].value, &args[1].value);
        }
        if is_chain(stmt) {
            return convert_chain(graph, stmt, None);
        }
        let key = catalog::normalize_key(function);
        if key == "for" && args.len() >= 3 {
            return convert_for(graph, args);
        }
        if key == "if" && args.len() >= 2 {
            return convert_if(graph, args);
        }
    }
    convert_expression(graph, stmt)
}

fn convert_assignment(graph: &mut BlockGraph, target: &ParseNode, value: &ParseNode) -> String {
    let target_text = deparse(target);
    if target_text == DATA_PLACEHOLDER {
        // The reserved dataset placeholder gets its specialized import block
        // instead of a generic assignment.
        let id = graph.allocate_id();
        let mut block = BlockInstance::new(&id, DATA_TYPE);
        block.params.insert("source".to_string(), deparse(value));
        block.assigned_to = Some(DATA_PLACEHOLDER.to_string());
        graph.blocks.push(block);
        return id;
    }
    if is_chain(value) {
        return convert_chain(graph, value, Some(target_text));
    }
    let id = convert_expression(graph, value);
    if let Some(block) = graph.block_mut(&id) {
        block.assigned_to = Some(target_text);
    }
    id
}

/// A statement-level `+` call: the chain operator joining plot layers.
fn is_chain(node: &ParseNode) -> bool {
    matches!(node, ParseNode::Call { function, args } if function == "+" && args.len() == 2)
}

/// Flatten a chain expression into its ordered operand list, recursing only
/// through the chain operator itself.
fn flatten_chain<'a>(node: &'a ParseNode, out: &mut Vec<&'a ParseNode>) {
    if let ParseNode::Call { function, args } = node {
        if function == "+" && args.len() == 2 {
            flatten_chain(&args[0].value, out);
            flatten_chain(&args[1].value, out);
            return;
        }
    }
    out.push(node);
}

fn convert_chain(graph: &mut BlockGraph, node: &ParseNode, assigned_to: Option<String>) -> String {
    let mut operands = Vec::new();
    flatten_chain(node, &mut operands);

    let head_id = convert_expression(graph, operands[0]);
    let followers: Vec<String> = operands[1..]
        .iter()
        .map(|op| convert_expression(graph, op))
        .collect();
    if let Some(head) = graph.block_mut(&head_id) {
        head.assigned_to = assigned_to;
        head.chain_links = followers;
    }
    head_id
}

// ────────────────────────────────────────────────────────────────────────────
// Containers – one recursive statement-sequence expansion, parameterized by
// slot, covers both loops (1 slot) and conditionals (2 slots).
// ────────────────────────────────────────────────────────────────────────────

fn convert_for(graph: &mut BlockGraph, args: &[CallArg]) -> String {
    let id = graph.allocate_id();
    let mut block = BlockInstance::new(&id, "for");
    block.params.insert("var".to_string(), deparse(&args[0].value));
    block
        .params
        .insert("range".to_string(), deparse(&args[1].value));
    graph.blocks.push(block);
    expand_slot(graph, &args[2].value, &id, "body");
    id
}

fn convert_if(graph: &mut BlockGraph, args: &[CallArg]) -> String {
    let id = graph.allocate_id();
    let mut block = BlockInstance::new(&id, "if");
    block
        .params
        .insert("condition".to_string(), deparse(&args[0].value));
    graph.blocks.push(block);
    expand_slot(graph, &args[1].value, &id, "then");
    if let Some(else_arg) = args.get(2) {
        expand_slot(graph, &else_arg.value, &id, "else");
    }
    id
}

/// Expand a container body into one slot: a brace block contributes each of
/// its statements in order, anything else contributes a single statement.
/// Only the directly produced block of each statement is adopted; blocks
/// already claimed by a deeper container keep their own parent.
fn expand_slot(graph: &mut BlockGraph, body: &ParseNode, parent_id: &str, slot: &str) {
    let statements: Vec<&ParseNode> = match body {
        ParseNode::Call { function, args } if function == "{" => {
            args.iter().map(|a| &a.value).collect()
        }
        single => vec![single],
    };
    for stmt in statements {
        // Chain links are only valid on parentless blocks, so a chain
        // statement inside a container is carried as verbatim expression
        // text instead.
        let child_id = if contains_chain_statement(stmt) {
            let id = graph.allocate_id();
            let mut block = BlockInstance::new(&id, EXPR_TYPE);
            block.params.insert("code".to_string(), deparse(stmt));
            graph.blocks.push(block);
            id
        } else {
            convert_statement(graph, stmt)
        };
        attach_child(graph, &child_id, parent_id, slot);
    }
}

fn contains_chain_statement(stmt: &ParseNode) -> bool {
    if is_chain(stmt) {
        return true;
    }
    if let ParseNode::Call { function, args } = stmt {
        if ASSIGN_OPS.contains(&function.as_str()) && args.len() == 2 {
            return is_chain(&args[1].value);
        }
    }
    false
}

fn attach_child(graph: &mut BlockGraph, child_id: &str, parent_id: &str, slot: &str) {
    let already_parented = graph
        .block(child_id)
        .is_none_or(|b| b.parent_id.is_some());
    if already_parented {
        return;
    }
    if let Some(child) = graph.block_mut(child_id) {
        child.parent_id = Some(parent_id.to_string());
        child.slot_name = Some(slot.to_string());
        child.connections = Default::default();
    }
    if let Some(parent) = graph.block_mut(parent_id) {
        parent
            .children
            .entry(slot.to_string())
            .or_default()
            .push(child_id.to_string());
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Expression conversion
// ────────────────────────────────────────────────────────────────────────────

/// Convert an expression into a block: a catalog-mapped call when possible,
/// otherwise the generic function-call or verbatim-expression fallback.
fn convert_expression(graph: &mut BlockGraph, node: &ParseNode) -> String {
    if let ParseNode::Call { function, args } = node {
        if let Some(def) = catalog::lookup(function) {
            let mappable = !def.is_container()
                && !matches!(def.key, CALL_TYPE | EXPR_TYPE | ENTRY_TYPE | DATA_TYPE);
            if mappable {
                if let Some(params) = map_call_args(def, args) {
                    let id = graph.allocate_id();
                    let mut block = BlockInstance::new(&id, def.key);
                    block.params = params;
                    graph.blocks.push(block);
                    return id;
                }
                debug!(function = %function, "arguments did not fit the schema; using generic call block");
            }
        }
        if ast::is_function_name(function) {
            // UnmappedFunction: degrade to a generic block carrying the
            // literal name and reconstructed argument text.
            debug!(function = %function, "no catalog match for call");
            let id = graph.allocate_id();
            let mut block = BlockInstance::new(&id, CALL_TYPE);
            block.params.insert("fn".to_string(), function.clone());
            block.params.insert("args".to_string(), args_text(args));
            graph.blocks.push(block);
            return id;
        }
    }
    let id = graph.allocate_id();
    let mut block = BlockInstance::new(&id, EXPR_TYPE);
    block.params.insert("code".to_string(), deparse(node));
    graph.blocks.push(block);
    id
}

/// Map call arguments onto a definition's parameter schema.
///
/// The first positional argument of an aes-aware call maps to `mapping`
/// when it is itself an aesthetic-mapping call, else to `data`; remaining
/// positional arguments fill the definition's positional names in order;
/// named arguments pass through to their schema parameter. Arguments with
/// no home land in the `extra` parameter — or, when the schema has none,
/// the whole mapping is rejected so the caller can fall back to a generic
/// call block rather than drop an argument.
fn map_call_args(
    def: &BlockDefinition,
    args: &[CallArg],
) -> Option<indexmap::IndexMap<String, String>> {
    let mut params: indexmap::IndexMap<String, String> = indexmap::IndexMap::new();
    let mut extra: Vec<String> = Vec::new();
    let mut positional_index = 0usize;

    for arg in args {
        let text = deparse(&arg.value);
        match &arg.name {
            Some(name) => {
                if def.has_param(name) && !params.contains_key(name.as_str()) {
                    params.insert(name.clone(), text);
                } else {
                    extra.push(format!("{} = {}", name, text));
                }
            }
            None => {
                let target = if positional_index == 0
                    && def.aes_first
                    && arg.value.is_call_to("aes")
                    && !params.contains_key("mapping")
                {
                    Some("mapping")
                } else if positional_index == 0
                    && def.aes_first
                    && def.has_param("data")
                    && !params.contains_key("data")
                {
                    Some("data")
                } else {
                    next_free_positional(def, &params)
                };
                match target {
                    Some(name) => {
                        params.insert(name.to_string(), text);
                    }
                    None => extra.push(text),
                }
                positional_index += 1;
            }
        }
    }

    if !extra.is_empty() {
        if def.has_param("extra") {
            params.insert("extra".to_string(), extra.join(", "));
        } else {
            return None;
        }
    }
    Some(params)
}

fn next_free_positional<'d>(
    def: &'d BlockDefinition,
    params: &indexmap::IndexMap<String, String>,
) -> Option<&'d str> {
    def.positional
        .iter()
        .find(|name| !params.contains_key(**name))
        .copied()
}

// ────────────────────────────────────────────────────────────────────────────
// Wiring
// ────────────────────────────────────────────────────────────────────────────

/// Connect every parentless, non-follower block into one execution chain in
/// document order. Contained blocks and chain followers never receive
/// these connections.
fn wire_execution_order(graph: &mut BlockGraph) {
    let order: Vec<String> = graph
        .top_level_blocks()
        .iter()
        .map(|b| b.id.clone())
        .collect();
    for pair in order.windows(2) {
        if let Some(prev) = graph.block_mut(&pair[0]) {
            prev.connections.output = Some(pair[1].clone());
        }
        if let Some(next) = graph.block_mut(&pair[1]) {
            next.connections.input = Some(pair[0].clone());
        }
    }
}
