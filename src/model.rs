use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Block type key of the unique entry block every document starts from.
pub const ENTRY_TYPE: &str = "entry";

/// Variable name that marks an assignment as the document's dataset import.
pub const DATA_PLACEHOLDER: &str = "data";

// ────────────────────────────────────────────────────────────────────────────
// GraphDoc – binary serialization wrapper
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDoc {
    pub graph: BlockGraph,
}

impl GraphDoc {
    /// Save the GraphDoc to a binary file with magic bytes and versioning.
    pub fn save_to_binary<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        std::io::Write::write_all(&mut writer, b"BLOCKPLOT")?;
        std::io::Write::write_all(&mut writer, &1u32.to_le_bytes())?;
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())?;
        Ok(())
    }

    /// Load a GraphDoc from a binary file, checking magic bytes and version.
    pub fn load_from_binary<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        let mut magic = [0u8; 9];
        std::io::Read::read_exact(&mut reader, &mut magic)?;
        if &magic != b"BLOCKPLOT" {
            anyhow::bail!("Invalid magic bytes: expected 'BLOCKPLOT'");
        }
        let mut version_bytes = [0u8; 4];
        std::io::Read::read_exact(&mut reader, &mut version_bytes)?;
        let version = u32::from_le_bytes(version_bytes);
        if version != 1 {
            anyhow::bail!("Unsupported version: {}", version);
        }
        let doc: GraphDoc =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;
        Ok(doc)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Position / Connections
// ────────────────────────────────────────────────────────────────────────────

/// Canvas position of a block, anchored at its top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Execution-order links of a block.
///
/// `input` is the id of the block emitted immediately before this one,
/// `output` the id of the block emitted immediately after. Both are `None`
/// for contained blocks and chain followers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connections {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl Connections {
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BlockInstance
// ────────────────────────────────────────────────────────────────────────────

/// One node of the block graph, corresponding to one statement or
/// sub-expression of the generated script.
///
/// `params` maps schema parameter names to raw expression text (never parsed
/// values) and preserves insertion order. `children` holds the ordered child
/// id lists of a container block, keyed by slot name; it mirrors the
/// `parent_id`/`slot_name` fields on the children themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInstance {
    pub id: String,
    pub block_type: String,
    #[serde(default)]
    pub params: IndexMap<String, String>,
    #[serde(default)]
    pub position: Position,
    /// Variable name this statement is assigned to. Only meaningful on a
    /// parentless block that is not a chain follower.
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub slot_name: Option<String>,
    #[serde(default)]
    pub children: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub connections: Connections,
    /// Ids of the "+"-joined followers of this block, in chain order.
    /// Followers never carry execution-order connections themselves.
    #[serde(default)]
    pub chain_links: Vec<String>,
}

impl BlockInstance {
    pub fn new(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            params: IndexMap::new(),
            position: Position::default(),
            assigned_to: None,
            parent_id: None,
            slot_name: None,
            children: IndexMap::new(),
            connections: Connections::default(),
            chain_links: Vec::new(),
        }
    }

    pub fn is_entry(&self) -> bool {
        self.block_type == ENTRY_TYPE
    }

    pub fn is_contained(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Ordered child ids of one slot (empty slice if the slot is unused).
    pub fn slot_children(&self, slot: &str) -> &[String] {
        self.children.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BlockGraph
// ────────────────────────────────────────────────────────────────────────────

/// The whole block document: every instance in document order plus the id
/// allocator state.
///
/// The `blocks` vector order is the document order used by the importer's
/// wiring pass and the reconciliation locality penalty. Ids are allocated
/// from `next_id` and never reused, even after deletion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockGraph {
    pub blocks: Vec<BlockInstance>,
    #[serde(default)]
    pub next_id: u64,
}

impl BlockGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph containing only a fresh entry block at the given
    /// position.
    pub fn with_entry(position: Position) -> Self {
        let mut graph = Self::new();
        let id = graph.allocate_id();
        let mut entry = BlockInstance::new(id, ENTRY_TYPE);
        entry.position = position;
        graph.blocks.push(entry);
        graph
    }

    /// Allocate the next block id. Ids are of the form `b1`, `b2`, … and are
    /// never handed out twice for the same graph.
    pub fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("b{}", self.next_id)
    }

    pub fn block(&self, id: &str) -> Option<&BlockInstance> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn block_mut(&mut self, id: &str) -> Option<&mut BlockInstance> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.iter().any(|b| b.id == id)
    }

    /// Document-order index of a block.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// The entry block, if exactly one exists.
    pub fn entry(&self) -> Option<&BlockInstance> {
        let mut entries = self.blocks.iter().filter(|b| b.is_entry());
        match (entries.next(), entries.next()) {
            (Some(e), None) => Some(e),
            _ => None,
        }
    }

    /// True if `id` is listed in any block's `chain_links`.
    pub fn is_chain_follower(&self, id: &str) -> bool {
        self.blocks
            .iter()
            .any(|b| b.chain_links.iter().any(|l| l == id))
    }

    /// The chain head listing `id` as a follower, with the follower's index
    /// in that head's `chain_links`.
    pub fn chain_head_of(&self, id: &str) -> Option<(&BlockInstance, usize)> {
        self.blocks.iter().find_map(|b| {
            b.chain_links
                .iter()
                .position(|l| l == id)
                .map(|idx| (b, idx))
        })
    }

    /// Parentless blocks that are not chain followers, in document order.
    /// These are the candidates for the execution-order chain.
    pub fn top_level_blocks(&self) -> Vec<&BlockInstance> {
        self.blocks
            .iter()
            .filter(|b| !b.is_contained() && !self.is_chain_follower(&b.id))
            .collect()
    }

    /// Walk all blocks recursively through containment, calling `cb` with the
    /// `(container id, slot)` path for every parentless block and its
    /// transitive children.
    pub fn walk_contained<F>(&self, cb: &mut F)
    where
        F: FnMut(&[(&str, &str)], &BlockInstance),
    {
        fn recurse<'a, F>(
            graph: &'a BlockGraph,
            block: &'a BlockInstance,
            path: &mut Vec<(&'a str, &'a str)>,
            cb: &mut F,
        ) where
            F: FnMut(&[(&str, &str)], &BlockInstance),
        {
            cb(path, block);
            for (slot, ids) in &block.children {
                for id in ids {
                    if let Some(child) = graph.block(id) {
                        path.push((block.id.as_str(), slot.as_str()));
                        recurse(graph, child, path, cb);
                        path.pop();
                    }
                }
            }
        }
        let mut path = Vec::new();
        for block in self.blocks.iter().filter(|b| !b.is_contained()) {
            recurse(self, block, &mut path, cb);
        }
    }

    /// Find all blocks of a given type, in document order.
    pub fn blocks_of_type(&self, block_type: &str) -> Vec<&BlockInstance> {
        self.blocks
            .iter()
            .filter(|b| b.block_type == block_type)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_ids_never_repeat() {
        let mut graph = BlockGraph::new();
        let a = graph.allocate_id();
        let b = graph.allocate_id();
        assert_ne!(a, b);
        assert_eq!(a, "b1");
        assert_eq!(b, "b2");
    }

    #[test]
    fn entry_lookup_requires_uniqueness() {
        let mut graph = BlockGraph::with_entry(Position::new(40, 40));
        assert!(graph.entry().is_some());
        let id = graph.allocate_id();
        graph.blocks.push(BlockInstance::new(id, ENTRY_TYPE));
        assert!(graph.entry().is_none());
    }

    #[test]
    fn walk_contained_visits_children_with_their_slot_path() {
        let mut graph = BlockGraph::with_entry(Position::default());
        let loop_id = graph.allocate_id();
        let child_id = graph.allocate_id();
        let mut loop_block = BlockInstance::new(&loop_id, "for");
        loop_block
            .children
            .insert("body".to_string(), vec![child_id.clone()]);
        graph.blocks.push(loop_block);
        let mut child = BlockInstance::new(&child_id, "print");
        child.parent_id = Some(loop_id.clone());
        child.slot_name = Some("body".to_string());
        graph.blocks.push(child);

        let mut visits: Vec<(String, usize)> = Vec::new();
        graph.walk_contained(&mut |path, block| {
            visits.push((block.id.clone(), path.len()));
        });
        assert_eq!(visits.len(), 3);
        assert!(visits.contains(&(loop_id.clone(), 0)));
        assert!(visits.contains(&(child_id.clone(), 1)));
    }

    #[test]
    fn chain_follower_lookup() {
        let mut graph = BlockGraph::with_entry(Position::default());
        let head_id = graph.allocate_id();
        let follower_id = graph.allocate_id();
        let mut head = BlockInstance::new(&head_id, "ggplot");
        head.chain_links.push(follower_id.clone());
        graph.blocks.push(head);
        graph
            .blocks
            .push(BlockInstance::new(&follower_id, "geom_point"));

        assert!(graph.is_chain_follower(&follower_id));
        assert!(!graph.is_chain_follower(&head_id));
        let (head, idx) = graph.chain_head_of(&follower_id).unwrap();
        assert_eq!(head.id, head_id);
        assert_eq!(idx, 0);
    }
}
