//! The owned block document and its editing operations.
//!
//! All mutation goes through [`Document`] command methods under a
//! single-writer discipline: each command runs to completion, records an
//! invertible [`EditorCommand`] for undo/redo, tags the edit with its
//! [`EditOrigin`] and bumps the revision counter. There are no ambient
//! globals; a controller owns the document and processes one command at a
//! time.
//!
//! The revision counter and origin tag also carry the import protocol:
//! [`Document::begin_import`] snapshots the revision before the external
//! parser is awaited, and [`Document::commit_import`] refuses to merge a
//! candidate when a conflicting edit (or a newer import) landed in the
//! meantime. A discarded import has no observable effect — no partial
//! mutation is ever applied.

use anyhow::{Result, bail};
use tracing::debug;

use crate::catalog;
use crate::generator;
use crate::layout;
use crate::model::{BlockGraph, BlockInstance, Connections, Position};
use crate::reconcile;
use crate::validate::{self, GraphIssue};

// ────────────────────────────────────────────────────────────────────────────
// Edit origin & import protocol types
// ────────────────────────────────────────────────────────────────────────────

/// Which side of the dual representation produced the latest change.
///
/// The controller uses this tag to keep the two derived views one-directional:
/// a graph change with `User` origin re-generates text, while a merge with
/// `Import` origin must not re-trigger the text pipeline it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    User,
    Import,
}

/// Snapshot handed out when an import starts; required to commit its result.
#[derive(Debug, Clone, Copy)]
pub struct ImportTicket {
    epoch: u64,
    revision: u64,
}

/// Why a finished import was discarded instead of merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A newer import was started; only the most recent one may merge.
    Superseded,
    /// The live graph was edited while the import was in flight.
    ConcurrentEdit,
}

/// Result of [`Document::commit_import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    Aborted(AbortReason),
}

// ────────────────────────────────────────────────────────────────────────────
// Editor commands (undo/redo units)
// ────────────────────────────────────────────────────────────────────────────

/// Where a block sits structurally: its containment (parent id, slot, index
/// within the slot) and its execution-order connections.
#[derive(Debug, Clone)]
pub struct Placement {
    pub parent: Option<(String, String, usize)>,
    pub connections: Connections,
}

/// A single undoable editor operation. Each variant captures enough state to
/// reverse itself.
#[derive(Debug, Clone)]
pub enum EditorCommand {
    AddBlock {
        index: usize,
        block: Box<BlockInstance>,
    },
    RemoveBlock {
        index: usize,
        block: Box<BlockInstance>,
        /// Index within the old parent's slot list, if the block was contained.
        parent_entry: Option<usize>,
        /// `(head id, index)` if the block was a chain follower.
        chain_entry: Option<(String, usize)>,
    },
    MoveBlock {
        id: String,
        old_position: Position,
        new_position: Position,
    },
    SetParam {
        id: String,
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
    SetAssigned {
        id: String,
        old: Option<String>,
        new: Option<String>,
    },
    Connect {
        from: String,
        to: String,
    },
    Disconnect {
        from: String,
        to: String,
    },
    /// Containment change: move a block between placements.
    Place {
        id: String,
        from: Placement,
        to: Placement,
    },
    ReorderChild {
        parent: String,
        slot: String,
        from: usize,
        to: usize,
    },
    AddChainLink {
        head: String,
        follower: String,
        index: usize,
        old_connections: Connections,
    },
    RemoveChainLink {
        head: String,
        follower: String,
        index: usize,
        old_connections: Connections,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Editor history (undo / redo stack)
// ────────────────────────────────────────────────────────────────────────────

/// Undo/redo history with a bounded depth.
#[derive(Debug, Clone, Default)]
pub struct EditorHistory {
    undo_stack: Vec<EditorCommand>,
    redo_stack: Vec<EditorCommand>,
    max_size: usize,
}

impl EditorHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    fn push(&mut self, cmd: EditorCommand) {
        self.undo_stack.push(cmd);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    fn undo(&mut self, graph: &mut BlockGraph) -> bool {
        if let Some(cmd) = self.undo_stack.pop() {
            let inverse = apply_inverse(graph, &cmd);
            self.redo_stack.push(inverse);
            true
        } else {
            false
        }
    }

    fn redo(&mut self, graph: &mut BlockGraph) -> bool {
        if let Some(cmd) = self.redo_stack.pop() {
            let inverse = apply_inverse(graph, &cmd);
            self.undo_stack.push(inverse);
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document
// ────────────────────────────────────────────────────────────────────────────

/// The live block document: the graph plus everything needed to keep the
/// two representations synchronized.
#[derive(Debug, Clone)]
pub struct Document {
    graph: BlockGraph,
    revision: u64,
    last_origin: EditOrigin,
    import_epoch: u64,
    history: EditorHistory,
}

const HISTORY_DEPTH: usize = 100;

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// A fresh document containing only the entry block.
    pub fn new() -> Self {
        Self::from_graph(BlockGraph::with_entry(Position::new(
            layout::LEFT_COLUMN_X,
            layout::TOP_Y,
        )))
    }

    /// Wrap an existing graph (e.g. loaded from disk).
    pub fn from_graph(graph: BlockGraph) -> Self {
        Self {
            graph,
            revision: 0,
            last_origin: EditOrigin::User,
            import_epoch: 0,
            history: EditorHistory::new(HISTORY_DEPTH),
        }
    }

    pub fn graph(&self) -> &BlockGraph {
        &self.graph
    }

    pub fn into_graph(self) -> BlockGraph {
        self.graph
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_origin(&self) -> EditOrigin {
        self.last_origin
    }

    /// Generate the document's script text. Pure; does not count as an edit.
    pub fn generate(&self) -> String {
        generator::generate(&self.graph)
    }

    /// Check every structural invariant of the current graph.
    pub fn validate(&self) -> Vec<GraphIssue> {
        validate::validate(&self.graph)
    }

    fn record(&mut self, cmd: EditorCommand) {
        self.history.push(cmd);
        self.revision += 1;
        self.last_origin = EditOrigin::User;
    }

    // ── Block lifecycle ──────────────────────────────────────────────────

    /// Add a new block of a cataloged type, applying schema defaults.
    pub fn add_block(&mut self, block_type: &str, position: Position) -> Result<String> {
        let Some(def) = catalog::lookup(block_type) else {
            bail!("unknown block type '{}'", block_type);
        };
        if def.key == crate::model::ENTRY_TYPE && self.graph.entry().is_some() {
            bail!("document already has an entry block");
        }
        let id = self.graph.allocate_id();
        let mut block = BlockInstance::new(&id, def.key);
        block.position = position;
        for param in def.params {
            if let Some(default) = param.default {
                block.params.insert(param.name.to_string(), default.to_string());
            }
        }
        let index = self.graph.blocks.len();
        self.graph.blocks.push(block.clone());
        self.record(EditorCommand::AddBlock {
            index,
            block: Box::new(block),
        });
        Ok(id)
    }

    /// Remove a block. Cascades: neighbor connections are spliced, children
    /// are promoted to top level atomically, chain followers are orphaned.
    pub fn remove_block(&mut self, id: &str) -> Result<()> {
        let Some(block) = self.graph.block(id) else {
            bail!("no block with id '{}'", id);
        };
        if block.is_entry() {
            bail!("the entry block cannot be removed");
        }
        let cmd = detach_block(&mut self.graph, id)
            .ok_or_else(|| anyhow::anyhow!("no block with id '{}'", id))?;
        self.record(cmd);
        Ok(())
    }

    pub fn move_block(&mut self, id: &str, x: i32, y: i32) -> Result<()> {
        let Some(block) = self.graph.block_mut(id) else {
            bail!("no block with id '{}'", id);
        };
        let old_position = block.position;
        let new_position = Position::new(x, y);
        block.position = new_position;
        self.record(EditorCommand::MoveBlock {
            id: id.to_string(),
            old_position,
            new_position,
        });
        Ok(())
    }

    /// Set (or clear, with `None`) one parameter's raw expression text.
    pub fn set_param(&mut self, id: &str, name: &str, value: Option<&str>) -> Result<()> {
        let Some(block) = self.graph.block_mut(id) else {
            bail!("no block with id '{}'", id);
        };
        let old = match value {
            Some(v) => block.params.insert(name.to_string(), v.to_string()),
            None => block.params.shift_remove(name),
        };
        self.record(EditorCommand::SetParam {
            id: id.to_string(),
            name: name.to_string(),
            old,
            new: value.map(str::to_string),
        });
        Ok(())
    }

    /// Set or clear the variable name a statement is assigned to. Chain
    /// followers cannot carry one: only the head's assignment prefixes the
    /// rendered statement.
    pub fn set_assigned(&mut self, id: &str, value: Option<&str>) -> Result<()> {
        if value.is_some() && self.graph.is_chain_follower(id) {
            bail!("a chain follower cannot carry an assignment");
        }
        let Some(block) = self.graph.block_mut(id) else {
            bail!("no block with id '{}'", id);
        };
        let old = block.assigned_to.take();
        block.assigned_to = value.map(str::to_string);
        self.record(EditorCommand::SetAssigned {
            id: id.to_string(),
            old,
            new: value.map(str::to_string),
        });
        Ok(())
    }

    // ── Execution-order connections ──────────────────────────────────────

    /// Wire `from` → `to` in the execution order.
    ///
    /// Refused (with the graph left unchanged) when either endpoint is
    /// contained or a chain follower, when either end of the link is
    /// already occupied, or when the connection would create a cycle.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            bail!("connection from '{}' to itself would create a cycle", from);
        }
        let Some(from_block) = self.graph.block(from) else {
            bail!("no block with id '{}'", from);
        };
        let Some(to_block) = self.graph.block(to) else {
            bail!("no block with id '{}'", to);
        };
        if from_block.is_contained() || to_block.is_contained() {
            bail!("contained blocks cannot join the execution chain");
        }
        if self.graph.is_chain_follower(from) || self.graph.is_chain_follower(to) {
            bail!("chain followers cannot join the execution chain");
        }
        if from_block.connections.output.is_some() {
            bail!("block '{}' already has an output connection", from);
        }
        if to_block.connections.input.is_some() {
            bail!("block '{}' already has an input connection", to);
        }
        if self.path_exists(to, from) {
            bail!(
                "connection from '{}' to '{}' would create a cycle",
                from,
                to
            );
        }
        self.graph.block_mut(from).unwrap().connections.output = Some(to.to_string());
        self.graph.block_mut(to).unwrap().connections.input = Some(from.to_string());
        self.record(EditorCommand::Connect {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    /// Remove the `from` → `to` execution-order link.
    pub fn disconnect(&mut self, from: &str, to: &str) -> Result<()> {
        let linked = self
            .graph
            .block(from)
            .is_some_and(|b| b.connections.output.as_deref() == Some(to));
        if !linked {
            bail!("blocks '{}' and '{}' are not connected", from, to);
        }
        self.graph.block_mut(from).unwrap().connections.output = None;
        if let Some(to_block) = self.graph.block_mut(to) {
            to_block.connections.input = None;
        }
        self.record(EditorCommand::Disconnect {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    /// True if a forward path along `output` links leads from `start` to
    /// `goal`.
    fn path_exists(&self, start: &str, goal: &str) -> bool {
        let mut visited = std::collections::HashSet::new();
        let mut cursor = Some(start.to_string());
        while let Some(id) = cursor {
            if id == goal {
                return true;
            }
            if !visited.insert(id.clone()) {
                return false;
            }
            cursor = self
                .graph
                .block(&id)
                .and_then(|b| b.connections.output.clone());
        }
        false
    }

    // ── Containment ──────────────────────────────────────────────────────

    /// Move a block into a container slot (splicing it out of the
    /// execution chain first).
    pub fn reparent(&mut self, child: &str, parent: &str, slot: &str) -> Result<()> {
        let Some(child_block) = self.graph.block(child) else {
            bail!("no block with id '{}'", child);
        };
        if child_block.is_entry() {
            bail!("the entry block cannot be contained");
        }
        if !child_block.chain_links.is_empty() {
            bail!("a chain head cannot be contained");
        }
        if self.graph.is_chain_follower(child) {
            bail!("a chain follower cannot be contained");
        }
        let Some(parent_block) = self.graph.block(parent) else {
            bail!("no block with id '{}'", parent);
        };
        let Some(def) = catalog::lookup(&parent_block.block_type) else {
            bail!("unknown block type '{}'", parent_block.block_type);
        };
        if !def.slots.contains(&slot) {
            bail!(
                "block type '{}' has no slot named '{}'",
                parent_block.block_type,
                slot
            );
        }
        // A container cannot end up inside its own subtree.
        let mut ancestor = Some(parent.to_string());
        while let Some(a) = ancestor {
            if a == child {
                bail!("reparenting '{}' under '{}' would contain it in itself", child, parent);
            }
            ancestor = self.graph.block(&a).and_then(|b| b.parent_id.clone());
        }

        let from = capture_placement(&self.graph, child);
        detach_placement(&mut self.graph, child);
        if let Some(c) = self.graph.block_mut(child) {
            c.parent_id = Some(parent.to_string());
            c.slot_name = Some(slot.to_string());
        }
        let index = {
            let parent_block = self.graph.block_mut(parent).unwrap();
            let slot_list = parent_block.children.entry(slot.to_string()).or_default();
            slot_list.push(child.to_string());
            slot_list.len() - 1
        };
        let to = Placement {
            parent: Some((parent.to_string(), slot.to_string(), index)),
            connections: Connections::default(),
        };
        self.record(EditorCommand::Place {
            id: child.to_string(),
            from,
            to,
        });
        Ok(())
    }

    /// Promote a contained block back to the top level (unconnected).
    pub fn unparent(&mut self, child: &str) -> Result<()> {
        let Some(child_block) = self.graph.block(child) else {
            bail!("no block with id '{}'", child);
        };
        if !child_block.is_contained() {
            bail!("block '{}' is not contained", child);
        }
        let from = capture_placement(&self.graph, child);
        detach_placement(&mut self.graph, child);
        let to = Placement {
            parent: None,
            connections: Connections::default(),
        };
        self.record(EditorCommand::Place {
            id: child.to_string(),
            from,
            to,
        });
        Ok(())
    }

    /// Reorder a child within its slot.
    pub fn reorder_child(&mut self, parent: &str, slot: &str, from: usize, to: usize) -> Result<()> {
        let Some(parent_block) = self.graph.block_mut(parent) else {
            bail!("no block with id '{}'", parent);
        };
        let Some(slot_list) = parent_block.children.get_mut(slot) else {
            bail!("block '{}' has no children in slot '{}'", parent, slot);
        };
        if from >= slot_list.len() || to >= slot_list.len() {
            bail!("child index out of range for slot '{}'", slot);
        }
        let id = slot_list.remove(from);
        slot_list.insert(to, id);
        self.record(EditorCommand::ReorderChild {
            parent: parent.to_string(),
            slot: slot.to_string(),
            from,
            to,
        });
        Ok(())
    }

    // ── Chains ───────────────────────────────────────────────────────────

    /// Append `follower` to `head`'s chain (splicing the follower out of the
    /// execution chain first).
    pub fn add_chain_link(&mut self, head: &str, follower: &str) -> Result<()> {
        if head == follower {
            bail!("a block cannot chain onto itself");
        }
        let Some(head_block) = self.graph.block(head) else {
            bail!("no block with id '{}'", head);
        };
        if head_block.is_contained() {
            bail!("a contained block cannot head a chain");
        }
        let Some(follower_block) = self.graph.block(follower) else {
            bail!("no block with id '{}'", follower);
        };
        if follower_block.is_contained() {
            bail!("a contained block cannot join a chain");
        }
        if follower_block.is_entry() || head_block.is_entry() {
            bail!("the entry block cannot take part in a chain");
        }
        if self.graph.is_chain_follower(follower) {
            bail!("block '{}' already follows a chain head", follower);
        }
        // The follower's own transitive links must not lead back to the head.
        let mut stack = vec![follower.to_string()];
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if id == head {
                bail!("chaining '{}' after '{}' would create a cycle", follower, head);
            }
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(b) = self.graph.block(&id) {
                stack.extend(b.chain_links.iter().cloned());
            }
        }

        let old_connections = splice_out(&mut self.graph, follower);
        let index = {
            let head_block = self.graph.block_mut(head).unwrap();
            head_block.chain_links.push(follower.to_string());
            head_block.chain_links.len() - 1
        };
        self.record(EditorCommand::AddChainLink {
            head: head.to_string(),
            follower: follower.to_string(),
            index,
            old_connections,
        });
        Ok(())
    }

    /// Remove `follower` from `head`'s chain, leaving it orphaned at top
    /// level.
    pub fn remove_chain_link(&mut self, head: &str, follower: &str) -> Result<()> {
        let Some(head_block) = self.graph.block_mut(head) else {
            bail!("no block with id '{}'", head);
        };
        let Some(index) = head_block.chain_links.iter().position(|l| l == follower) else {
            bail!("block '{}' does not follow '{}'", follower, head);
        };
        head_block.chain_links.remove(index);
        self.record(EditorCommand::RemoveChainLink {
            head: head.to_string(),
            follower: follower.to_string(),
            index,
            old_connections: Connections::default(),
        });
        Ok(())
    }

    // ── Undo / redo ──────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        let done = self.history.undo(&mut self.graph);
        if done {
            self.revision += 1;
            self.last_origin = EditOrigin::User;
        }
        done
    }

    pub fn redo(&mut self) -> bool {
        let done = self.history.redo(&mut self.graph);
        if done {
            self.revision += 1;
            self.last_origin = EditOrigin::User;
        }
        done
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ── Import protocol ──────────────────────────────────────────────────

    /// Start an import: the returned ticket is required to commit its
    /// result. Starting a new import supersedes every earlier in-flight one.
    pub fn begin_import(&mut self) -> ImportTicket {
        self.import_epoch += 1;
        ImportTicket {
            epoch: self.import_epoch,
            revision: self.revision,
        }
    }

    /// Merge an imported candidate graph onto the live graph, unless the
    /// import was superseded or the live graph changed in the meantime.
    /// An aborted merge discards the candidate and leaves the document
    /// untouched; it is silent by design and only logged.
    pub fn commit_import(&mut self, ticket: ImportTicket, candidate: BlockGraph) -> MergeOutcome {
        if ticket.epoch != self.import_epoch {
            debug!("import aborted: superseded by a newer import");
            return MergeOutcome::Aborted(AbortReason::Superseded);
        }
        if ticket.revision != self.revision {
            debug!(
                ticket_revision = ticket.revision,
                live_revision = self.revision,
                "import aborted: live graph changed while the import was in flight"
            );
            return MergeOutcome::Aborted(AbortReason::ConcurrentEdit);
        }
        self.graph = reconcile::reconcile(&self.graph, &candidate);
        self.revision += 1;
        self.last_origin = EditOrigin::Import;
        // Index-based inverse commands do not survive a wholesale merge.
        self.history.clear();
        MergeOutcome::Merged
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Low-level graph surgery shared by commands and their inverses
// ────────────────────────────────────────────────────────────────────────────

/// Bridge a block's execution-chain neighbors around it and clear its own
/// connections, returning the old connections.
fn splice_out(graph: &mut BlockGraph, id: &str) -> Connections {
    let old = match graph.block(id) {
        Some(b) => b.connections.clone(),
        None => return Connections::default(),
    };
    if let Some(prev_id) = &old.input {
        if let Some(prev) = graph.block_mut(prev_id) {
            prev.connections.output = old.output.clone();
        }
    }
    if let Some(next_id) = &old.output {
        if let Some(next) = graph.block_mut(next_id) {
            next.connections.input = old.input.clone();
        }
    }
    if let Some(block) = graph.block_mut(id) {
        block.connections = Connections::default();
    }
    old
}

/// Re-point a block's neighbors at it according to `connections`, then set
/// them on the block itself.
fn install_connections(graph: &mut BlockGraph, id: &str, connections: &Connections) {
    if let Some(prev_id) = &connections.input {
        if let Some(prev) = graph.block_mut(prev_id) {
            prev.connections.output = Some(id.to_string());
        }
    }
    if let Some(next_id) = &connections.output {
        if let Some(next) = graph.block_mut(next_id) {
            next.connections.input = Some(id.to_string());
        }
    }
    if let Some(block) = graph.block_mut(id) {
        block.connections = connections.clone();
    }
}

fn capture_placement(graph: &BlockGraph, id: &str) -> Placement {
    let block = graph.block(id);
    let parent = block.and_then(|b| {
        let parent_id = b.parent_id.clone()?;
        let slot = b.slot_name.clone()?;
        let index = graph
            .block(&parent_id)?
            .slot_children(&slot)
            .iter()
            .position(|c| c == id)?;
        Some((parent_id, slot, index))
    });
    Placement {
        parent,
        connections: block.map(|b| b.connections.clone()).unwrap_or_default(),
    }
}

/// Detach a block from the execution chain and from its container, without
/// removing it from the graph.
fn detach_placement(graph: &mut BlockGraph, id: &str) {
    splice_out(graph, id);
    let parent = graph
        .block(id)
        .and_then(|b| b.parent_id.clone().zip(b.slot_name.clone()));
    if let Some((parent_id, slot)) = parent {
        if let Some(parent_block) = graph.block_mut(&parent_id) {
            if let Some(slot_list) = parent_block.children.get_mut(&slot) {
                slot_list.retain(|c| c != id);
            }
        }
    }
    if let Some(block) = graph.block_mut(id) {
        block.parent_id = None;
        block.slot_name = None;
    }
}

/// Restore a block to a previously captured placement.
fn apply_placement(graph: &mut BlockGraph, id: &str, placement: &Placement) {
    detach_placement(graph, id);
    if let Some((parent_id, slot, index)) = &placement.parent {
        if let Some(block) = graph.block_mut(id) {
            block.parent_id = Some(parent_id.clone());
            block.slot_name = Some(slot.clone());
        }
        if let Some(parent_block) = graph.block_mut(parent_id) {
            let slot_list = parent_block.children.entry(slot.clone()).or_default();
            let index = (*index).min(slot_list.len());
            slot_list.insert(index, id.to_string());
        }
    }
    install_connections(graph, id, &placement.connections);
}

/// Remove a block with the full cascade, returning the command that undoes
/// it. `None` if the block does not exist.
fn detach_block(graph: &mut BlockGraph, id: &str) -> Option<EditorCommand> {
    let index = graph.index_of(id)?;

    splice_out(graph, id);

    // Promote children to top level; the removed block's own `children` map
    // (kept in the clone below) is what restores them on undo.
    let child_ids: Vec<String> = graph.blocks[index]
        .children
        .values()
        .flatten()
        .cloned()
        .collect();
    for child_id in &child_ids {
        if let Some(child) = graph.block_mut(child_id) {
            child.parent_id = None;
            child.slot_name = None;
        }
    }

    // Drop the block from its container's slot list, if contained.
    let parent_entry = {
        let block = &graph.blocks[index];
        block
            .parent_id
            .clone()
            .zip(block.slot_name.clone())
            .and_then(|(parent_id, slot)| {
                let parent = graph.block(&parent_id)?;
                parent.slot_children(&slot).iter().position(|c| c == id)
            })
    };
    if parent_entry.is_some() {
        let (parent_id, slot) = {
            let block = &graph.blocks[index];
            (block.parent_id.clone().unwrap(), block.slot_name.clone().unwrap())
        };
        if let Some(parent) = graph.block_mut(&parent_id) {
            if let Some(slot_list) = parent.children.get_mut(&slot) {
                slot_list.retain(|c| c != id);
            }
        }
    }

    // Drop the block from its head's chain, if it was a follower.
    let chain_entry = graph
        .chain_head_of(id)
        .map(|(head, link_index)| (head.id.clone(), link_index));
    if let Some((head_id, link_index)) = &chain_entry {
        if let Some(head) = graph.block_mut(head_id) {
            head.chain_links.remove(*link_index);
        }
    }

    let block = graph.blocks.remove(index);
    Some(EditorCommand::RemoveBlock {
        index,
        block: Box::new(block),
        parent_entry,
        chain_entry,
    })
}

/// Apply the inverse of a command to the graph, returning the forward
/// command for the redo stack.
fn apply_inverse(graph: &mut BlockGraph, cmd: &EditorCommand) -> EditorCommand {
    match cmd {
        EditorCommand::AddBlock { index, block } => detach_block(graph, &block.id)
            .unwrap_or_else(|| EditorCommand::AddBlock {
                index: *index,
                block: block.clone(),
            }),
        EditorCommand::RemoveBlock {
            index,
            block,
            parent_entry,
            chain_entry,
        } => {
            let index = (*index).min(graph.blocks.len());
            graph.blocks.insert(index, (**block).clone());
            install_connections(graph, &block.id, &block.connections.clone());
            // Re-claim promoted children.
            let claims: Vec<(String, String)> = block
                .children
                .iter()
                .flat_map(|(slot, ids)| ids.iter().map(move |i| (slot.clone(), i.clone())))
                .collect();
            for (slot, child_id) in claims {
                if let Some(child) = graph.block_mut(&child_id) {
                    child.parent_id = Some(block.id.clone());
                    child.slot_name = Some(slot);
                }
            }
            if let Some(entry_index) = parent_entry {
                if let Some((parent_id, slot)) = block.parent_id.clone().zip(block.slot_name.clone())
                {
                    if let Some(parent) = graph.block_mut(&parent_id) {
                        let slot_list = parent.children.entry(slot).or_default();
                        let entry_index = (*entry_index).min(slot_list.len());
                        slot_list.insert(entry_index, block.id.clone());
                    }
                }
            }
            if let Some((head_id, link_index)) = chain_entry {
                if let Some(head) = graph.block_mut(head_id) {
                    let link_index = (*link_index).min(head.chain_links.len());
                    head.chain_links.insert(link_index, block.id.clone());
                }
            }
            EditorCommand::AddBlock {
                index,
                block: block.clone(),
            }
        }
        EditorCommand::MoveBlock {
            id,
            old_position,
            new_position,
        } => {
            if let Some(block) = graph.block_mut(id) {
                block.position = *old_position;
            }
            EditorCommand::MoveBlock {
                id: id.clone(),
                old_position: *new_position,
                new_position: *old_position,
            }
        }
        EditorCommand::SetParam { id, name, old, new } => {
            if let Some(block) = graph.block_mut(id) {
                match old {
                    Some(v) => {
                        block.params.insert(name.clone(), v.clone());
                    }
                    None => {
                        block.params.shift_remove(name);
                    }
                }
            }
            EditorCommand::SetParam {
                id: id.clone(),
                name: name.clone(),
                old: new.clone(),
                new: old.clone(),
            }
        }
        EditorCommand::SetAssigned { id, old, new } => {
            if let Some(block) = graph.block_mut(id) {
                block.assigned_to = old.clone();
            }
            EditorCommand::SetAssigned {
                id: id.clone(),
                old: new.clone(),
                new: old.clone(),
            }
        }
        EditorCommand::Connect { from, to } => {
            if let Some(from_block) = graph.block_mut(from) {
                from_block.connections.output = None;
            }
            if let Some(to_block) = graph.block_mut(to) {
                to_block.connections.input = None;
            }
            EditorCommand::Disconnect {
                from: from.clone(),
                to: to.clone(),
            }
        }
        EditorCommand::Disconnect { from, to } => {
            if let Some(from_block) = graph.block_mut(from) {
                from_block.connections.output = Some(to.clone());
            }
            if let Some(to_block) = graph.block_mut(to) {
                to_block.connections.input = Some(from.clone());
            }
            EditorCommand::Connect {
                from: from.clone(),
                to: to.clone(),
            }
        }
        EditorCommand::Place { id, from, to } => {
            apply_placement(graph, id, from);
            EditorCommand::Place {
                id: id.clone(),
                from: to.clone(),
                to: from.clone(),
            }
        }
        EditorCommand::ReorderChild {
            parent,
            slot,
            from,
            to,
        } => {
            if let Some(parent_block) = graph.block_mut(parent) {
                if let Some(slot_list) = parent_block.children.get_mut(slot) {
                    if *to < slot_list.len() && *from <= slot_list.len() {
                        let id = slot_list.remove(*to);
                        slot_list.insert((*from).min(slot_list.len()), id);
                    }
                }
            }
            EditorCommand::ReorderChild {
                parent: parent.clone(),
                slot: slot.clone(),
                from: *to,
                to: *from,
            }
        }
        EditorCommand::AddChainLink {
            head,
            follower,
            index,
            old_connections,
        } => {
            if let Some(head_block) = graph.block_mut(head) {
                head_block.chain_links.retain(|l| l != follower);
            }
            install_connections(graph, follower, &old_connections.clone());
            EditorCommand::RemoveChainLink {
                head: head.clone(),
                follower: follower.clone(),
                index: *index,
                old_connections: old_connections.clone(),
            }
        }
        EditorCommand::RemoveChainLink {
            head,
            follower,
            index,
            old_connections,
        } => {
            splice_out(graph, follower);
            if let Some(head_block) = graph.block_mut(head) {
                let index = (*index).min(head_block.chain_links.len());
                head_block.chain_links.insert(index, follower.clone());
            }
            EditorCommand::AddChainLink {
                head: head.clone(),
                follower: follower.clone(),
                index: *index,
                old_connections: old_connections.clone(),
            }
        }
    }
}
