//! The data model: `WorldState`, `GlobalState`, `Account` and `Transaction`.

use crate::annotation::AnnotationBag;
use crate::cfg::NodeId;
use crate::constraints::ConstraintSet;
use crate::smt::BitVec;
use bytes::Bytes;
use ethereum_types::H256;
use rustc_hash::FxHashMap;

pub type Address = ethereum_types::H160;

/// A single account: balance, nonce, code and storage.
#[derive(Debug, Clone, Default)]
pub struct Account {
    pub balance: BitVec,
    pub nonce: u64,
    pub code: Bytes,
    pub storage: FxHashMap<H256, BitVec>,
    /// Name of the contract deployed at this address, used by the CFG
    /// builder to key node labels and disassembly lookups. Empty until a
    /// creation driver or world state loader names the account.
    pub contract_name: String,
}

impl Account {
    pub fn new(balance: BitVec, code: Bytes, contract_name: impl Into<String>) -> Self {
        Self {
            balance,
            nonce: 0,
            code,
            storage: FxHashMap::default(),
            contract_name: contract_name.into(),
        }
    }
}

/// The persistent view shared across a transaction: accounts, the
/// transaction audit log, and topological keccak bookkeeping.
///
/// Cloned shallowly when a call may mutate; originals retained on revert.
/// This crate clones the account map in full on fork — cheaper copy-on-write
/// sharing is an optimization left to a later pass, since raw throughput is
/// not a design goal here.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    pub accounts: FxHashMap<Address, Account>,
    /// Audit trail of transactions executed against this world state.
    pub transaction_sequence: Vec<TransactionKind>,
    /// Topological keccak keys accumulated so far along this path, reset at
    /// each new transaction round by `reset_topo_keys`. `GlobalState` has no
    /// storage of its own for these — it reads and appends through its
    /// `world_state`, the same single storage `reset_topo_keys` clears.
    pub topo_keys: Vec<BitVec>,
    /// The CFG node this (committed) world state was finalised under.
    pub node: Option<NodeId>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets per-round topological-keys bookkeeping for every remaining
    /// open state at the start of a new transaction round.
    pub fn reset_topo_keys(&mut self) {
        self.topo_keys.clear();
    }

    pub fn account(&self, address: Address) -> Option<&Account> {
        self.accounts.get(&address)
    }

    pub fn account_mut(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }
}

/// The abstract transaction kind: a message call or a contract creation.
#[derive(Debug, Clone)]
pub enum TransactionKind {
    MessageCall(MessageCallTransaction),
    ContractCreation(ContractCreationTransaction),
}

#[derive(Debug, Clone, Default)]
pub struct MessageCallTransaction {
    pub caller: BitVec,
    pub callee: Address,
    pub calldata: Bytes,
    pub call_value: BitVec,
    pub return_data: Option<Bytes>,
    pub revert: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ContractCreationTransaction {
    pub caller: BitVec,
    pub init_code: Bytes,
    pub call_value: BitVec,
    pub return_data: Option<Bytes>,
    pub revert: bool,
}

impl TransactionKind {
    pub fn is_contract_creation(&self) -> bool {
        matches!(self, TransactionKind::ContractCreation(_))
    }

    pub fn return_data(&self) -> Option<&Bytes> {
        match self {
            TransactionKind::MessageCall(tx) => tx.return_data.as_ref(),
            TransactionKind::ContractCreation(tx) => tx.return_data.as_ref(),
        }
    }

    pub fn revert(&self) -> bool {
        match self {
            TransactionKind::MessageCall(tx) => tx.revert,
            TransactionKind::ContractCreation(tx) => tx.revert,
        }
    }

    pub fn caller(&self) -> &BitVec {
        match self {
            TransactionKind::MessageCall(tx) => &tx.caller,
            TransactionKind::ContractCreation(tx) => &tx.caller,
        }
    }

    /// Mints the initial `GlobalState` for this transaction, inheriting
    /// `world_state` (the caller's, already cloned by the lifecycle
    /// handler). A contract-creation transaction has no pre-existing callee
    /// account, so the active account is materialised fresh in that world
    /// state.
    pub fn initial_global_state(&self, node: NodeId, mut world_state: WorldState) -> GlobalState {
        let (callee, calldata, call_value) = match self {
            TransactionKind::MessageCall(tx) => {
                (tx.callee, tx.calldata.clone(), tx.call_value.clone())
            }
            TransactionKind::ContractCreation(tx) => {
                (Address::zero(), tx.init_code.clone(), tx.call_value.clone())
            }
        };
        world_state.account_mut(callee);
        world_state.transaction_sequence.push(self.clone());

        GlobalState {
            world_state,
            environment: Environment {
                active_account: callee,
                sender: self.caller().clone(),
                calldata,
                call_value,
                active_function_name: None,
            },
            mstate: MachineState::new(),
            node,
            transaction_stack: Vec::new(),
            last_return_data: None,
            annotations: AnnotationBag::new(),
        }
    }
}

/// Active account, caller, call data and value for the current transaction.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub active_account: Address,
    pub sender: BitVec,
    pub calldata: Bytes,
    pub call_value: BitVec,
    pub active_function_name: Option<String>,
}

/// Program counter, stack, memory, constraint set and gas bounds.
#[derive(Debug, Clone, Default)]
pub struct MachineState {
    pub pc: usize,
    pub stack: Vec<BitVec>,
    pub memory: Vec<u8>,
    pub constraints: ConstraintSet,
    pub min_gas_used: u64,
    pub max_gas_used: u64,
}

impl MachineState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One frame of the transaction call stack: the transaction being run, and
/// (for nested calls) the caller's `GlobalState` to resume into once this
/// transaction ends. `None` marks a top-level transaction.
pub type TransactionFrame = (TransactionKind, Option<Box<GlobalState>>);

/// The per-path execution state.
#[derive(Debug, Clone)]
pub struct GlobalState {
    pub world_state: WorldState,
    pub environment: Environment,
    pub mstate: MachineState,
    pub node: NodeId,
    pub transaction_stack: Vec<TransactionFrame>,
    pub last_return_data: Option<Bytes>,
    pub annotations: AnnotationBag,
}

impl GlobalState {
    /// Depth implied by the transaction stack, used by strategies to enforce
    /// `max_depth`.
    pub fn depth(&self) -> usize {
        self.transaction_stack.len()
    }

    pub fn current_transaction(&self) -> Option<&TransactionKind> {
        self.transaction_stack.last().map(|(tx, _)| tx)
    }

    /// Symbolic terms known to equal a keccak output, accumulated along this
    /// path. Backed by `world_state.topo_keys` — the same single storage
    /// `WorldState::reset_topo_keys` clears at each transaction round — not a
    /// separate field, so the reset actually clears what concretisation reads.
    pub fn topo_keys(&self) -> &Vec<BitVec> {
        &self.world_state.topo_keys
    }

    pub fn topo_keys_mut(&mut self) -> &mut Vec<BitVec> {
        &mut self.world_state.topo_keys
    }
}
