//! Control-flow graph: nodes, edges, jump-type classification and the
//! `manage_cfg` decision table.
//!
//! Modeled as an arena of nodes keyed by integer id: states carry a
//! `NodeId`, never a pointer, so the CFG and the worklist states can be
//! mutated independently without `Rc<RefCell<_>>` bookkeeping.

use crate::constraints::ConstraintSet;
use crate::smt::Term;
use bitflags_like::NodeFlags;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Bitmask flags carried by a CFG node.
pub mod bitflags_like {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct NodeFlags(u8);

    impl NodeFlags {
        pub const NONE: NodeFlags = NodeFlags(0);
        pub const FUNC_ENTRY: NodeFlags = NodeFlags(0b01);
        pub const CALL_RETURN: NodeFlags = NodeFlags(0b10);

        pub fn contains(self, other: NodeFlags) -> bool {
            self.0 & other.0 == other.0
        }
    }

    impl std::ops::BitOr for NodeFlags {
        type Output = NodeFlags;
        fn bitor(self, rhs: NodeFlags) -> NodeFlags {
            NodeFlags(self.0 | rhs.0)
        }
    }

    impl std::ops::BitOrAssign for NodeFlags {
        fn bitor_assign(&mut self, rhs: NodeFlags) {
            self.0 |= rhs.0;
        }
    }
}

/// Identifies a [`Node`] in the CFG arena. Stable for the lifetime of the
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// CFG edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpType {
    Unconditional,
    Conditional,
    Call,
    Return,
}

/// A CFG vertex. `states` records, in arrival order, every `GlobalState` id
/// that passed through this node (used by downstream detectors, not by the
/// engine itself, so we keep a lightweight handle rather than the states
/// themselves to avoid duplicating ownership of live worklist entries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub contract_name: String,
    pub function_name: String,
    pub flags: NodeFlags,
    pub constraints: ConstraintSet,
    /// Number of global states that have passed through this node so far.
    pub state_count: u64,
}

impl Node {
    fn new(id: NodeId, contract_name: String) -> Self {
        Self {
            id,
            contract_name,
            function_name: String::new(),
            flags: NodeFlags::NONE,
            constraints: ConstraintSet::new(),
            state_count: 0,
        }
    }
}

/// Disassembly metadata the CFG builder consults to name functions.
/// Per-opcode disassembly itself is an external collaborator; this is just
/// the function-boundary table the builder needs to flag FUNC_ENTRY and
/// label nodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Disassembly {
    /// First-instruction PC of each named function.
    pub address_to_function_name: FxHashMap<usize, String>,
}

impl Disassembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, address: usize, name: impl Into<String>) -> Self {
        self.address_to_function_name.insert(address, name.into());
        self
    }
}

/// A directed CFG edge, optionally guarded by the path condition that
/// distinguishes it from its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub src: NodeId,
    pub dst: NodeId,
    pub jump_type: JumpType,
    pub condition: Option<Term>,
}

/// The recorded control-flow graph. Written only when CFG recording is
/// enabled (`requires_statespace`); contents otherwise unreferenced.
#[derive(Debug, Default)]
pub struct Cfg {
    nodes: rustc_hash::FxHashMap<NodeId, Node>,
    edges: Vec<Edge>,
    next_id: u64,
    recording: bool,
}

impl Cfg {
    pub fn new(recording: bool) -> Self {
        Self {
            nodes: rustc_hash::FxHashMap::default(),
            edges: Vec::new(),
            next_id: 0,
            recording,
        }
    }

    /// Mints the root node for a fresh session/transaction.
    pub fn root_node(&mut self, contract_name: impl Into<String>) -> NodeId {
        let id = self.alloc_id();
        let node = Node::new(id, contract_name.into());
        self.nodes.insert(id, node);
        id
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn nodes_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Mints a new node as a successor of `old`, optionally recording the
    /// edge, and returns its id. `constraints` seeds the new node's own
    /// constraint set with the minting successor's path constraints — a
    /// freshly minted node otherwise carries no constraints of its own,
    /// leaving downstream consumers with only the edge guard.
    pub fn new_successor_node(
        &mut self,
        old: NodeId,
        contract_name: String,
        jump_type: JumpType,
        condition: Option<Term>,
        constraints: ConstraintSet,
    ) -> NodeId {
        let new_id = self.alloc_id();
        let mut node = Node::new(new_id, contract_name);
        node.constraints = constraints;
        self.nodes.insert(new_id, node);

        if self.recording {
            self.edges.push(Edge {
                src: old,
                dst: new_id,
                jump_type,
                condition,
            });
        }

        new_id
    }

    /// Records that a global state passed through `node_id`.
    pub fn record_state(&mut self, node_id: NodeId) {
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.state_count += 1;
        }
    }
}
