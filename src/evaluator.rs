//! External interfaces: the instruction evaluator and its collaborators.
//! Per-opcode semantics, dynamic chain loading, the contract-creation driver
//! and vulnerability detection are all out of scope here — this module only
//! states the traits the engine calls through.

use crate::errors::SvmError;
use crate::opcode::Opcode;
use crate::profiler::InstructionProfiler;
use crate::state::{Address, GlobalState, TransactionKind, WorldState};

/// Raised when a step can't continue along the current path. Carries enough
/// context to log; the engine never inspects its contents beyond that — a
/// VM exception is handled by the lifecycle and never surfaced further.
#[derive(Debug, Clone)]
pub struct VmException {
    pub message: String,
}

/// A nested transaction is beginning.
#[derive(Debug)]
pub struct TransactionStartSignal {
    pub transaction: TransactionKind,
    /// The state that raised the signal, whose constraints and transaction
    /// stack the freshly minted state inherits.
    pub global_state: GlobalState,
}

/// A transaction is ending, top-level or nested.
#[derive(Debug)]
pub struct TransactionEndSignal {
    pub global_state: GlobalState,
    pub revert: bool,
}

/// The tagged result of evaluating one opcode. Modeled as a plain enum
/// rather than a thrown exception so control flow stays explicit in the
/// type signature.
pub enum InstructionOutcome {
    Successors(Vec<GlobalState>),
    VmException(VmException),
    TransactionStart(Box<TransactionStartSignal>),
    TransactionEnd(Box<TransactionEndSignal>),
    /// The evaluator does not implement this opcode. Never a panic.
    Unimplemented,
}

/// Opaque collaborator for fetching external contract code/state. The
/// engine threads it through to the evaluator and never inspects it.
pub trait DynamicLoader {}

/// A loader that has nothing to load, useful for tests and for analyses
/// confined to a preconfigured world state.
#[derive(Debug, Default)]
pub struct NullDynamicLoader;

impl DynamicLoader for NullDynamicLoader {}

/// Per-opcode semantics. `post_call` selects the post-call re-evaluation
/// mode used by `end_message_call`.
pub trait InstructionEvaluator {
    fn evaluate(
        &self,
        state: &mut GlobalState,
        dynamic_loader: &mut dyn DynamicLoader,
        profiler: Option<&mut InstructionProfiler>,
        post_call: bool,
    ) -> InstructionOutcome;
}

/// Vulnerability-detection collaborator, invoked at a successful top-level
/// transaction end. Ships a no-op default so the engine is usable without a
/// detector wired in.
pub trait VulnerabilityCollaborator {
    fn on_transaction_end(&self, state: &GlobalState) {
        let _ = state;
    }
}

#[derive(Debug, Default)]
pub struct NullVulnerabilityCollaborator;

impl VulnerabilityCollaborator for NullVulnerabilityCollaborator {}

/// The contract-creation driver: populates `open_states` with
/// post-construction states and returns the address the created contract
/// landed at.
pub trait CreationDriver {
    fn create(
        &mut self,
        engine: &mut crate::engine::Engine,
        creation_code: &[u8],
        contract_name: &str,
        world_state: WorldState,
    ) -> Result<Address, SvmError>;
}

/// The message-call driver: expands each open world state into one or more
/// worklist seeds, drains `open_states`, and runs `exec` until the worklist
/// is empty.
pub trait MessageCallDriver {
    fn run(&mut self, engine: &mut crate::engine::Engine, address: Address) -> Result<(), SvmError>;
}
