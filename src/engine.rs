//! The engine that ties every component together: the instruction step,
//! transaction lifecycle, the CFG builder's `manage_cfg` decision table, and
//! the driver loop.
//!
//! `Engine` owns the worklist, the CFG arena, the hook registry, the keccak
//! manager and the session configuration, and threads them through a single
//! `sym_exec` campaign. Per-opcode semantics, the SMT solver, dynamic chain
//! loading, the creation driver and vulnerability detection stay external
//! collaborators reached through the traits in [`crate::evaluator`].

use crate::cfg::bitflags_like::NodeFlags;
use crate::cfg::{Cfg, Disassembly, JumpType, NodeId};
use crate::config::SessionConfig;
use crate::errors::SvmError;
use crate::evaluator::{
    CreationDriver, DynamicLoader, InstructionEvaluator, InstructionOutcome, MessageCallDriver,
    TransactionEndSignal, TransactionStartSignal, VulnerabilityCollaborator,
};
use crate::hooks::{HookKind, HookRegistry, LifecycleHook, OpcodeHook};
use crate::keccak::KeccakManager;
use crate::opcode::Opcode;
use crate::profiler::InstructionProfiler;
use crate::smt::{SmtBackend, Term};
use crate::state::{Address, GlobalState, TransactionKind, WorldState};
use crate::worklist::{CoveragePlugin, CoverageStrategy, Worklist, WorklistStrategy};
use bytes::Bytes;
use rustc_hash::FxHashMap;
use std::time::Instant;

/// `sym_exec`'s two mutually exclusive entry modes: either a preconfigured
/// world state plus a target address, or creation bytecode to be deployed
/// first. Modeling this as an enum rather than two optional parameters makes
/// "both or neither supplied" unrepresentable, which subsumes the
/// configuration-error check that would otherwise be needed at that site.
pub enum SymExecMode {
    Preconfigured {
        world_state: WorldState,
        target: Address,
    },
    Creation {
        creation_code: Bytes,
        contract_name: String,
    },
}

/// Owns the worklist, CFG, hook registry, keccak manager and session
/// configuration for one `sym_exec` campaign.
pub struct Engine {
    pub cfg: Cfg,
    pub hooks: HookRegistry,
    pub keccak: KeccakManager,
    pub config: SessionConfig,
    pub worklist: Worklist,
    pub strategy: Box<dyn WorklistStrategy>,
    pub open_states: Vec<WorldState>,
    pub total_states: u64,
    pub backend: Box<dyn SmtBackend>,
    pub evaluator: Box<dyn InstructionEvaluator>,
    pub dynamic_loader: Box<dyn DynamicLoader>,
    pub vulnerability: Box<dyn VulnerabilityCollaborator>,
    /// Function-boundary tables keyed by contract name, consulted by
    /// `manage_cfg` to name functions and flag entry points. Disassembly
    /// itself is external; this is just the table.
    pub disassembly: FxHashMap<String, Disassembly>,
    pub profiler: Option<InstructionProfiler>,
    /// Wall-clock origin for `execution_timeout`/`create_timeout`, started
    /// once at `sym_exec` entry.
    session_start: Option<Instant>,
}

impl Engine {
    /// `coverage_plugin` is consulted only when `config.enable_coverage_strategy`
    /// is set: the default strategy is wrapped with a [`CoverageStrategy`]
    /// around it. When the flag is set but no plugin is supplied, the engine
    /// logs a warning and falls back to the unwrapped default strategy rather
    /// than failing construction — callers that don't care about coverage
    /// guidance can pass `None` unconditionally.
    pub fn new(
        config: SessionConfig,
        backend: Box<dyn SmtBackend>,
        evaluator: Box<dyn InstructionEvaluator>,
        dynamic_loader: Box<dyn DynamicLoader>,
        vulnerability: Box<dyn VulnerabilityCollaborator>,
        coverage_plugin: Option<Box<dyn CoveragePlugin>>,
    ) -> Self {
        let profiler = config.enable_iprof.then(InstructionProfiler::new);
        let cfg = Cfg::new(config.requires_statespace);
        let keccak = KeccakManager::new(config.actor_roster.clone());

        let strategy = if config.enable_coverage_strategy {
            match coverage_plugin {
                Some(plugin) => {
                    Box::new(CoverageStrategy::new(config.default_strategy(), plugin))
                        as Box<dyn WorklistStrategy>
                }
                None => {
                    tracing::warn!(
                        "enable_coverage_strategy is set but no CoveragePlugin was supplied; \
                         falling back to the unwrapped default strategy"
                    );
                    config.default_strategy()
                }
            }
        } else {
            config.default_strategy()
        };

        Self {
            cfg,
            hooks: HookRegistry::new(),
            keccak,
            config,
            worklist: Vec::new(),
            strategy,
            open_states: Vec::new(),
            total_states: 0,
            backend,
            evaluator,
            dynamic_loader,
            vulnerability,
            disassembly: FxHashMap::default(),
            profiler,
            session_start: None,
        }
    }

    pub fn register_hooks(&mut self, kind: HookKind, opcode: Opcode, hook: Box<dyn OpcodeHook>) {
        self.hooks.register_hooks(kind, opcode, hook);
    }

    pub fn register_lifecycle_hook(&mut self, hook: Box<dyn LifecycleHook>) {
        self.hooks.register_lifecycle_hook(hook);
    }

    pub fn register_disassembly(&mut self, contract_name: impl Into<String>, disassembly: Disassembly) {
        self.disassembly.insert(contract_name.into(), disassembly);
    }

    /// Re-wraps the current strategy, e.g. to apply the coverage wrapper
    /// after construction rather than only via `enable_coverage_strategy`.
    pub fn extend_strategy(
        &mut self,
        wrap: impl FnOnce(Box<dyn WorklistStrategy>) -> Box<dyn WorklistStrategy>,
    ) {
        let placeholder: Box<dyn WorklistStrategy> =
            Box::new(crate::worklist::DepthFirstSearchStrategy::default());
        let current = std::mem::replace(&mut self.strategy, placeholder);
        self.strategy = wrap(current);
    }

    // ---------------------------------------------------------------
    // Driver
    // ---------------------------------------------------------------

    /// `sym_exec`: drives a whole campaign in either mode. Configuration
    /// errors (missing creation driver) are fatal; everything else
    /// propagates from the collaborators.
    pub fn sym_exec(
        &mut self,
        mode: SymExecMode,
        creation_driver: Option<&mut dyn CreationDriver>,
        message_call_driver: &mut dyn MessageCallDriver,
    ) -> Result<(), SvmError> {
        self.session_start = Some(Instant::now());
        self.hooks.fire_start_sym_exec();
        tracing::info!("starting sym_exec session");

        let target = match mode {
            SymExecMode::Preconfigured { world_state, target } => {
                self.open_states = vec![world_state];
                target
            }
            SymExecMode::Creation {
                creation_code,
                contract_name,
            } => {
                let driver = creation_driver.ok_or_else(|| {
                    SvmError::Configuration(
                        "creation mode requires a CreationDriver to be supplied".into(),
                    )
                })?;
                let world_state = WorldState::new();
                let address = driver.create(self, &creation_code, &contract_name, world_state)?;
                if self.open_states.is_empty() {
                    tracing::warn!(
                        contract_name = %contract_name,
                        "no contract was created during creation-mode execution"
                    );
                }
                address
            }
        };

        self.execute_transactions(target, message_call_driver)?;

        self.hooks.fire_stop_sym_exec();
        tracing::info!(
            total_states = self.total_states,
            nodes = self.cfg.nodes_len(),
            "sym_exec session complete"
        );
        if let Some(profiler) = &self.profiler {
            tracing::info!("Instruction Statistics:\n{}", profiler.pretty());
        }
        Ok(())
    }

    /// Runs `transaction_count` rounds, each draining `open_states` through
    /// the message-call driver and resetting topological-keys bookkeeping
    /// between rounds.
    fn execute_transactions(
        &mut self,
        address: Address,
        message_call_driver: &mut dyn MessageCallDriver,
    ) -> Result<(), SvmError> {
        for round in 0..self.config.transaction_count {
            self.hooks.fire_start_sym_trans();
            tracing::debug!(
                round,
                initial_states = self.open_states.len(),
                "starting transaction round"
            );
            message_call_driver.run(self, address)?;
            for world_state in &mut self.open_states {
                world_state.reset_topo_keys();
            }
            self.hooks.fire_stop_sym_trans();
        }
        Ok(())
    }

    /// Iterates the strategy until the worklist is exhausted or the relevant
    /// deadline expires. When `track_gas` is set, a gas-estimation caller
    /// needs every state a step terminated on without producing a
    /// successor — a committed open state, a dropped top-level
    /// `VmException`, an unimplemented opcode, or a successor filtered out
    /// as unsatisfiable — plus the state the deadline cut off on, so all of
    /// those are collected into the returned list.
    pub fn exec(&mut self, create: bool, track_gas: bool) -> Option<Vec<GlobalState>> {
        let mut final_states = track_gas.then(Vec::new);

        loop {
            let Some(state) = self.strategy.next_state(&mut self.worklist) else {
                break;
            };

            if self.deadline_expired(create) {
                tracing::debug!(create, "deadline expired, stopping exec early");
                if let Some(states) = final_states.as_mut() {
                    states.push(state);
                }
                break;
            }

            let disassembly = self.disassembly_for(&state);
            let snapshot = track_gas.then(|| state.clone());
            let (mut successors, opcode) = self.execute_state(state);
            successors.retain(|s| s.mstate.constraints.is_possible(self.backend.as_ref()));

            if let Some(opcode) = opcode {
                self.manage_cfg(opcode, &mut successors, &disassembly);
            }

            if successors.is_empty() {
                if let (Some(states), Some(snapshot)) = (final_states.as_mut(), snapshot) {
                    states.push(snapshot);
                }
            }

            self.total_states += successors.len() as u64;
            self.worklist.extend(successors);
        }

        final_states
    }

    fn deadline_expired(&self, create: bool) -> bool {
        let Some(start) = self.session_start else {
            return false;
        };
        let limit = if create {
            self.config.create_timeout
        } else {
            self.config.execution_timeout
        };
        match limit {
            Some(limit) => start.elapsed() >= limit,
            None => false,
        }
    }

    fn disassembly_for(&self, state: &GlobalState) -> Disassembly {
        state
            .world_state
            .account(state.environment.active_account)
            .and_then(|account| self.disassembly.get(&account.contract_name))
            .cloned()
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Instruction step
    // ---------------------------------------------------------------

    /// Fetches the opcode at the program counter, runs hooks, delegates to
    /// the external evaluator, and translates its outcome into zero or more
    /// successor states.
    pub fn execute_state(&mut self, mut state: GlobalState) -> (Vec<GlobalState>, Option<Opcode>) {
        self.hooks.fire_execute_state(&mut state);

        let code_len = state
            .world_state
            .account(state.environment.active_account)
            .map(|account| account.code.len())
            .unwrap_or(0);

        if state.mstate.pc >= code_len {
            self.commit_world_state(state);
            return (Vec::new(), None);
        }

        let opcode_byte = state
            .world_state
            .account(state.environment.active_account)
            .map(|account| account.code[state.mstate.pc])
            .unwrap_or(0);
        let opcode = Opcode::from(opcode_byte);

        if self.hooks.run_pre(opcode, &mut state).is_err() {
            self.commit_world_state(state);
            return (Vec::new(), Some(opcode));
        }

        let outcome = self.evaluator.evaluate(
            &mut state,
            self.dynamic_loader.as_mut(),
            self.profiler.as_mut(),
            false,
        );

        match outcome {
            InstructionOutcome::Successors(mut successors) => {
                self.hooks.run_post(opcode, &mut successors);
                (successors, Some(opcode))
            }
            InstructionOutcome::Unimplemented => {
                tracing::debug!(opcode = opcode.name(), "unimplemented opcode, dropping state");
                (Vec::new(), Some(opcode))
            }
            InstructionOutcome::VmException(_) => {
                (self.handle_vm_exception(state, opcode), Some(opcode))
            }
            InstructionOutcome::TransactionStart(signal) => {
                (self.handle_transaction_start(*signal), Some(opcode))
            }
            InstructionOutcome::TransactionEnd(signal) => self.handle_transaction_end(*signal, opcode),
        }
    }

    /// Commits `state` as a terminal open world state through the
    /// `add_world_state` hooks, unless one of them vetoes with
    /// `SkipWorldState`.
    fn commit_world_state(&mut self, mut state: GlobalState) {
        if self.hooks.fire_add_world_state(&mut state).is_ok() {
            self.open_states.push(state.world_state);
        }
    }

    /// `TransactionStartSignal` handling: mints the callee's initial state,
    /// inheriting the caller's transaction stack (plus the new frame) and
    /// constraints, and the caller's CFG node. Post-hooks are deliberately
    /// not run here — they only make sense for a step's successors, and the
    /// freshly minted callee state isn't one.
    fn handle_transaction_start(&mut self, signal: TransactionStartSignal) -> Vec<GlobalState> {
        let TransactionStartSignal {
            transaction,
            global_state: caller,
        } = signal;

        let mut new_state = transaction.initial_global_state(caller.node, caller.world_state.clone());
        new_state.transaction_stack = caller.transaction_stack.clone();
        new_state.mstate.constraints.extend(&caller.mstate.constraints);
        new_state
            .transaction_stack
            .push((transaction, Some(Box::new(caller))));

        vec![new_state]
    }

    /// `VmException` handling: pops the current transaction frame. A
    /// top-level exception is an unrecoverable revert with no
    /// open-state commit; a nested one runs the ending opcode's post-hooks
    /// for their side effects, then hands off to `_end_message_call` with
    /// `revert = true` and no return data.
    fn handle_vm_exception(&mut self, mut state: GlobalState, opcode: Opcode) -> Vec<GlobalState> {
        let Some((tx, ret_state)) = state.transaction_stack.pop() else {
            return Vec::new();
        };
        match ret_state {
            None => Vec::new(),
            Some(ret_state) => {
                self.hooks.run_post_side_effect(opcode, &mut state);
                self.end_message_call(&state, &tx, *ret_state, true, None)
            }
        }
    }

    // ---------------------------------------------------------------
    // Transaction lifecycle — end signal
    // ---------------------------------------------------------------

    fn handle_transaction_end(
        &mut self,
        signal: TransactionEndSignal,
        opcode: Opcode,
    ) -> (Vec<GlobalState>, Option<Opcode>) {
        let TransactionEndSignal { mut global_state, revert } = signal;
        let Some((tx, ret_state)) = global_state.transaction_stack.pop() else {
            return (Vec::new(), Some(opcode));
        };

        let successors = match ret_state {
            None => {
                self.handle_top_level_end(global_state, tx, revert);
                Vec::new()
            }
            Some(ret_state) => {
                self.hooks.run_post_side_effect(opcode, &mut global_state);
                self.nested_transaction_end(global_state, tx, *ret_state, revert)
            }
        };
        (successors, Some(opcode))
    }

    /// Top-level end: a completed or failed top-level transaction never
    /// produces successors. A *successful*
    /// completion — not a reverted transaction, and not a contract creation
    /// that produced no return data — runs keccak concretisation, attaches
    /// the accumulated guard to the CFG node, and commits the world state.
    fn handle_top_level_end(&mut self, mut g: GlobalState, tx: TransactionKind, revert: bool) {
        let should_commit = (!tx.is_contract_creation() || tx.return_data().is_some()) && !revert;
        if !should_commit {
            return;
        }

        // No caller state exists to resume into at the top level, so there is
        // nothing for the freshly produced hash witnesses to be appended to;
        // a scratch clone absorbs them harmlessly.
        let mut scratch = g.clone();
        let (c, d, v, w) = self.keccak.concretize(&mut g, &mut scratch, self.backend.as_ref());

        self.vulnerability.on_transaction_end(&g);

        let node_id = g.node;
        g.world_state.node = Some(node_id);

        if let Some(node) = self.cfg.node_mut(node_id) {
            node.constraints.extend(&g.mstate.constraints);
            for term in &self.keccak.delete_constraints {
                node.constraints.remove_by_identity(term);
            }
            node.constraints.push(c.or(d).and(v));
            node.constraints.weighted.extend(w);
        }

        self.commit_world_state(g);
    }

    /// Nested end: runs keccak concretisation over `(g, g)` — the ending
    /// signal state, not the caller's return frame, mirroring the top-level
    /// site's scratch clone — strips the deletion set from the resuming
    /// state, propagates mutation annotations across `DELEGATECALL`/
    /// `CALLCODE` returns, and hands off to `end_message_call`.
    fn nested_transaction_end(
        &mut self,
        mut g: GlobalState,
        tx: TransactionKind,
        mut ret_state: GlobalState,
        revert: bool,
    ) -> Vec<GlobalState> {
        let mut scratch = g.clone();
        let (c, d, v, w) = self.keccak.concretize(&mut g, &mut scratch, self.backend.as_ref());
        g.mstate.constraints.push(c.or(d).and(v));
        g.mstate.constraints.weighted.extend(w);

        for term in self.keccak.delete_constraints.clone() {
            ret_state.mstate.constraints.remove_by_identity(&term);
        }

        // The opcode that *initiated* the call sits at the resuming state's
        // own PC, not at whatever opcode the callee happened to end on.
        if matches!(
            Self::opcode_at(&ret_state),
            Some(Opcode::DelegateCall | Opcode::CallCode)
        ) {
            let propagated = g.annotations.propagatable();
            ret_state.annotations.extend(propagated);
        }

        let return_data = tx.return_data().cloned();
        self.end_message_call(&g, &tx, ret_state, revert, return_data)
    }

    /// The opcode sitting at `state`'s own program counter, or `None` if the
    /// PC is past the end of its active account's code.
    fn opcode_at(state: &GlobalState) -> Option<Opcode> {
        let account = state.world_state.account(state.environment.active_account)?;
        let byte = *account.code.get(state.mstate.pc)?;
        Some(Opcode::from(byte))
    }

    /// Transfers the ending state's constraints onto the resuming state,
    /// resolves world-state/gas propagation unless reverting, re-enters the
    /// evaluator in post-call mode to consume the return value, and forces
    /// call-graph continuity by pinning every successor's node to the
    /// callee's.
    fn end_message_call(
        &mut self,
        g: &GlobalState,
        tx: &TransactionKind,
        mut return_state: GlobalState,
        revert: bool,
        return_data: Option<Bytes>,
    ) -> Vec<GlobalState> {
        return_state.mstate.constraints.extend(&g.mstate.constraints);
        return_state.last_return_data = return_data;

        if !revert {
            return_state.world_state = g.world_state.clone();
            let active = return_state.environment.active_account;
            return_state.world_state.account_mut(active);
            if tx.is_contract_creation() {
                return_state.mstate.min_gas_used += g.mstate.min_gas_used;
                return_state.mstate.max_gas_used += g.mstate.max_gas_used;
            }
        }

        let outcome = self.evaluator.evaluate(
            &mut return_state,
            self.dynamic_loader.as_mut(),
            self.profiler.as_mut(),
            true,
        );

        let mut successors = match outcome {
            InstructionOutcome::Successors(successors) => successors,
            _ => Vec::new(),
        };
        for successor in &mut successors {
            successor.node = g.node;
        }
        successors
    }

    // ---------------------------------------------------------------
    // CFG builder — `manage_cfg`
    // ---------------------------------------------------------------

    /// Applies the jump-type decision table to the successors of one step,
    /// minting new CFG nodes/edges where the opcode calls for it, then
    /// labels every successor's (possibly new) node with a function name
    /// and records its arrival.
    fn manage_cfg(&mut self, opcode: Opcode, successors: &mut [GlobalState], disassembly: &Disassembly) {
        match opcode {
            Opcode::Jump => {
                if let Some(successor) = successors.first_mut() {
                    Self::mint_node(&mut self.cfg, successor, JumpType::Unconditional, None);
                }
            }
            Opcode::Jumpi => {
                for successor in successors.iter_mut() {
                    let condition = successor.mstate.constraints.last().cloned();
                    Self::mint_node(&mut self.cfg, successor, JumpType::Conditional, condition);
                }
            }
            Opcode::Sload | Opcode::Sstore if successors.len() >= 2 => {
                for successor in successors.iter_mut() {
                    let condition = successor.mstate.constraints.last().cloned();
                    Self::mint_node(&mut self.cfg, successor, JumpType::Conditional, condition);
                }
            }
            Opcode::Return => {
                for successor in successors.iter_mut() {
                    let new_node = Self::mint_node(&mut self.cfg, successor, JumpType::Return, None);
                    if let Some(node) = self.cfg.node_mut(new_node) {
                        node.flags |= NodeFlags::CALL_RETURN;
                    }
                }
            }
            // CALL-family / CREATE / CREATE2 mint no new node here: the
            // decision table classifies anything outside JUMP/JUMPI/
            // SLOAD+SSTORE(fork)/RETURN as "other". A callee's own node
            // comes from inheriting its caller's node at the transaction
            // start signal (see `handle_transaction_start`), not from
            // `manage_cfg`.
            _ => {}
        }

        for successor in successors.iter_mut() {
            self.label_function(successor, disassembly);
            self.cfg.record_state(successor.node);
        }
    }

    fn mint_node(
        cfg: &mut Cfg,
        successor: &mut GlobalState,
        jump_type: JumpType,
        condition: Option<Term>,
    ) -> NodeId {
        let old = successor.node;
        let contract_name = successor
            .world_state
            .account(successor.environment.active_account)
            .map(|account| account.contract_name.clone())
            .unwrap_or_default();
        let new_node = cfg.new_successor_node(
            old,
            contract_name,
            jump_type,
            condition,
            successor.mstate.constraints.clone(),
        );
        successor.node = new_node;
        new_node
    }

    /// Consults `disassembly` to name the successor's current function: a
    /// known function entry flags `FUNC_ENTRY` and sets the active function
    /// name; PC zero is the fallback; a contract-creation transaction's
    /// entry is the constructor.
    fn label_function(&mut self, successor: &mut GlobalState, disassembly: &Disassembly) {
        let pc = successor.mstate.pc;
        let name = if let Some(function_name) = disassembly.address_to_function_name.get(&pc) {
            successor.environment.active_function_name = Some(function_name.clone());
            if let Some(node) = self.cfg.node_mut(successor.node) {
                node.flags |= NodeFlags::FUNC_ENTRY;
            }
            Some(function_name.clone())
        } else if pc == 0 {
            Some("fallback".to_string())
        } else if successor
            .current_transaction()
            .is_some_and(|tx| tx.is_contract_creation())
        {
            Some("constructor".to_string())
        } else {
            None
        };

        if let Some(name) = name {
            if let Some(node) = self.cfg.node_mut(successor.node) {
                node.function_name = name;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationBag;
    use crate::errors::HookSignal;
    use crate::evaluator::{NullDynamicLoader, NullVulnerabilityCollaborator};
    use crate::smt::{BitVec, NaiveBackend};
    use crate::state::{Account, Environment, MachineState, MessageCallTransaction, TransactionKind};
    use std::time::Duration;

    fn test_engine(evaluator: Box<dyn InstructionEvaluator>) -> Engine {
        Engine::new(
            SessionConfig::new(),
            Box::new(NaiveBackend),
            evaluator,
            Box::new(NullDynamicLoader),
            Box::new(NullVulnerabilityCollaborator),
            None,
        )
    }

    fn code_single_opcode(opcode: Opcode) -> Bytes {
        Bytes::from(vec![opcode.as_byte()])
    }

    fn seed_state(node: NodeId, code: Bytes, address: Address) -> GlobalState {
        let mut world_state = WorldState::new();
        world_state
            .accounts
            .insert(address, Account::new(BitVec::default(), code, "Target"));

        GlobalState {
            world_state,
            environment: Environment {
                active_account: address,
                ..Environment::default()
            },
            mstate: MachineState::new(),
            node,
            transaction_stack: vec![(
                TransactionKind::MessageCall(MessageCallTransaction::default()),
                None,
            )],
            last_return_data: None,
            annotations: AnnotationBag::new(),
        }
    }

    struct UnreachableEvaluator;
    impl InstructionEvaluator for UnreachableEvaluator {
        fn evaluate(
            &self,
            _state: &mut GlobalState,
            _dynamic_loader: &mut dyn DynamicLoader,
            _profiler: Option<&mut InstructionProfiler>,
            _post_call: bool,
        ) -> InstructionOutcome {
            unreachable!("evaluator must not run for this scenario")
        }
    }

    // Empty code: PC starts past the end of the account's code.
    #[test]
    fn empty_code_commits_single_open_state_with_no_successors() {
        let mut engine = test_engine(Box::new(UnreachableEvaluator));
        let root = engine.cfg.root_node("Target");
        let state = seed_state(root, Bytes::new(), Address::zero());

        let (successors, opcode) = engine.execute_state(state);

        assert!(successors.is_empty());
        assert!(opcode.is_none());
        assert_eq!(engine.open_states.len(), 1);
        assert!(engine.cfg.edges().is_empty());
    }

    struct JumpiEvaluator;
    impl InstructionEvaluator for JumpiEvaluator {
        fn evaluate(
            &self,
            state: &mut GlobalState,
            _dynamic_loader: &mut dyn DynamicLoader,
            _profiler: Option<&mut InstructionProfiler>,
            _post_call: bool,
        ) -> InstructionOutcome {
            let mut taken = state.clone();
            taken.mstate.pc = 1;
            taken.mstate.constraints.push(Term::bool_var("branch_taken"));

            let mut not_taken = state.clone();
            not_taken.mstate.pc = 1;
            not_taken
                .mstate
                .constraints
                .push(Term::bool_var("branch_not_taken"));

            InstructionOutcome::Successors(vec![taken, not_taken])
        }
    }

    // JUMPI with both branches satisfiable mints two conditional edges.
    #[test]
    fn jumpi_with_two_branches_mints_two_conditional_edges() {
        let mut engine = test_engine(Box::new(JumpiEvaluator));
        let root = engine.cfg.root_node("Target");
        let state = seed_state(root, code_single_opcode(Opcode::Jumpi), Address::zero());

        let (mut successors, opcode) = engine.execute_state(state);
        assert_eq!(opcode, Some(Opcode::Jumpi));
        assert_eq!(successors.len(), 2);

        engine.manage_cfg(opcode.expect("opcode"), &mut successors, &Disassembly::new());

        assert_eq!(engine.cfg.edges().len(), 2);
        for (successor, edge) in successors.iter().zip(engine.cfg.edges()) {
            assert_eq!(edge.src, root);
            assert_eq!(edge.jump_type, JumpType::Conditional);
            assert_eq!(edge.condition.as_ref(), successor.mstate.constraints.last());
        }
    }

    struct VetoOnPre;
    impl OpcodeHook for VetoOnPre {
        fn pre(&mut self, _state: &mut GlobalState) -> Result<(), HookSignal> {
            Err(HookSignal::SkipState)
        }
    }

    // A pre-hook veto on SSTORE commits the state with no successors.
    #[test]
    fn pre_hook_veto_commits_state_with_no_successors() {
        let mut engine = test_engine(Box::new(UnreachableEvaluator));
        engine.register_hooks(HookKind::Pre, Opcode::Sstore, Box::new(VetoOnPre));
        let root = engine.cfg.root_node("Target");
        let state = seed_state(root, code_single_opcode(Opcode::Sstore), Address::zero());

        let (successors, opcode) = engine.execute_state(state);

        assert!(successors.is_empty());
        assert_eq!(opcode, Some(Opcode::Sstore));
        assert_eq!(engine.open_states.len(), 1);
    }

    struct CallThenEndEvaluator {
        revert: bool,
    }
    impl InstructionEvaluator for CallThenEndEvaluator {
        fn evaluate(
            &self,
            state: &mut GlobalState,
            _dynamic_loader: &mut dyn DynamicLoader,
            _profiler: Option<&mut InstructionProfiler>,
            post_call: bool,
        ) -> InstructionOutcome {
            if post_call {
                // `_end_message_call`'s post-call re-evaluation just needs to
                // consume the return value and yield the resumed state.
                return InstructionOutcome::Successors(vec![state.clone()]);
            }
            if state.depth() == 1 {
                let tx = TransactionKind::MessageCall(MessageCallTransaction {
                    caller: BitVec::default(),
                    callee: Address::from_low_u64_be(2),
                    calldata: Bytes::new(),
                    call_value: BitVec::default(),
                    return_data: Some(Bytes::from_static(b"result")),
                    revert: self.revert,
                });
                InstructionOutcome::TransactionStart(Box::new(TransactionStartSignal {
                    transaction: tx,
                    global_state: state.clone(),
                }))
            } else {
                InstructionOutcome::TransactionEnd(Box::new(TransactionEndSignal {
                    global_state: state.clone(),
                    revert: self.revert,
                }))
            }
        }
    }

    // Nested call round-trip, revert = false. CALL mints no CFG node of its
    // own (that decision table row is "other"; a callee's node comes from
    // inheriting its caller's at the transaction-start signal), so the
    // callee's node is still `root` here — the round trip below checks that
    // `end_message_call` pins every surviving successor back to it.
    #[test]
    fn nested_call_round_trip_forces_callee_node_and_return_data() {
        let mut engine = test_engine(Box::new(CallThenEndEvaluator { revert: false }));
        let root = engine.cfg.root_node("Target");
        let caller_address = Address::zero();
        let state = seed_state(root, code_single_opcode(Opcode::Call), caller_address);

        let (mut successors, opcode) = engine.execute_state(state);
        assert_eq!(opcode, Some(Opcode::Call));
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].depth(), 2);

        engine.manage_cfg(opcode.expect("opcode"), &mut successors, &Disassembly::new());
        let callee_node = successors[0].node;
        assert_eq!(callee_node, root);

        let mut child = successors.remove(0);
        let callee_address = child.environment.active_account;
        child.world_state.account_mut(callee_address).code = code_single_opcode(Opcode::Call);

        let (successors, opcode) = engine.execute_state(child);
        assert_eq!(opcode, Some(Opcode::Call));
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].node, callee_node);
        assert_eq!(
            successors[0].last_return_data.as_deref(),
            Some(&b"result"[..])
        );
        assert!(successors[0].world_state.account(callee_address).is_some());
    }

    // Revert discards the callee's world state.
    #[test]
    fn reverted_nested_call_leaves_return_state_world_unchanged() {
        let mut engine = test_engine(Box::new(CallThenEndEvaluator { revert: true }));
        let root = engine.cfg.root_node("Target");
        let caller_address = Address::zero();
        let state = seed_state(root, code_single_opcode(Opcode::Call), caller_address);

        let (mut successors, opcode) = engine.execute_state(state);
        engine.manage_cfg(opcode.expect("opcode"), &mut successors, &Disassembly::new());

        let mut child = successors.remove(0);
        let callee_address = child.environment.active_account;
        child.world_state.account_mut(callee_address).code = code_single_opcode(Opcode::Call);

        let (successors, _opcode) = engine.execute_state(child);
        assert_eq!(successors.len(), 1);
        assert!(successors[0].world_state.account(callee_address).is_none());
        assert_eq!(successors[0].world_state.accounts.len(), 1);
        assert!(successors[0].world_state.account(caller_address).is_some());
    }

    struct StopMessageCallDriver;
    impl MessageCallDriver for StopMessageCallDriver {
        fn run(&mut self, engine: &mut Engine, address: Address) -> Result<(), SvmError> {
            let world_states = std::mem::take(&mut engine.open_states);
            for _world_state in world_states {
                let root = engine.cfg.root_node("Target");
                engine
                    .worklist
                    .push(seed_state(root, Bytes::new(), address));
            }
            engine.exec(false, false);
            Ok(())
        }
    }

    // Creation mode without a creation driver is a configuration error.
    #[test]
    fn creation_mode_without_driver_is_a_configuration_error() {
        let mut engine = test_engine(Box::new(UnreachableEvaluator));
        let mut driver = StopMessageCallDriver;
        let result = engine.sym_exec(
            SymExecMode::Creation {
                creation_code: Bytes::new(),
                contract_name: "Target".into(),
            },
            None,
            &mut driver,
        );
        assert!(matches!(result, Err(SvmError::Configuration(_))));
    }

    // Preconfigured mode drains the seeded world state through the message
    // call driver and commits the STOP opcode's empty-successor open state.
    #[test]
    fn preconfigured_sym_exec_drains_open_states_through_driver() {
        let mut engine = test_engine(Box::new(UnreachableEvaluator));
        let address = Address::zero();
        let mut world_state = WorldState::new();
        world_state
            .accounts
            .insert(address, Account::new(BitVec::default(), Bytes::new(), "Target"));
        let mut driver = StopMessageCallDriver;

        let result = engine.sym_exec(
            SymExecMode::Preconfigured { world_state, target: address },
            None,
            &mut driver,
        );

        assert!(result.is_ok());
        assert_eq!(engine.open_states.len(), 1);
    }

    // Deadline expiry stops `exec` before the worklist is drained.
    #[test]
    fn deadline_expiry_stops_exec_before_worklist_is_drained() {
        let mut engine = test_engine(Box::new(UnreachableEvaluator));
        engine.config.execution_timeout = Some(Duration::from_millis(1));
        engine.session_start = Some(Instant::now() - Duration::from_secs(10));
        let root = engine.cfg.root_node("Target");

        for _ in 0..1000 {
            engine
                .worklist
                .push(seed_state(root, code_single_opcode(Opcode::Stop), Address::zero()));
        }

        let remaining = engine.exec(false, true);

        assert!(engine.worklist.len() < 1000);
        assert!(remaining.is_some_and(|states| states.len() == 1));
        for edge in engine.cfg.edges() {
            assert!(engine.cfg.node(edge.src).is_some());
            assert!(engine.cfg.node(edge.dst).is_some());
        }
    }

    // track_gas collects a state whose step produced no successors for a
    // reason other than the deadline — here, empty code committing as an
    // open state with no successors.
    #[test]
    fn track_gas_collects_states_that_terminate_without_successors() {
        let mut engine = test_engine(Box::new(UnreachableEvaluator));
        let root = engine.cfg.root_node("Target");
        engine
            .worklist
            .push(seed_state(root, Bytes::new(), Address::zero()));

        let final_states = engine.exec(false, true);

        assert!(final_states.is_some_and(|states| states.len() == 1));
        assert_eq!(engine.open_states.len(), 1);
    }

    // track_gas=false collects nothing, regardless of how steps terminate.
    #[test]
    fn track_gas_disabled_collects_nothing() {
        let mut engine = test_engine(Box::new(UnreachableEvaluator));
        let root = engine.cfg.root_node("Target");
        engine
            .worklist
            .push(seed_state(root, Bytes::new(), Address::zero()));

        let final_states = engine.exec(false, false);

        assert!(final_states.is_none());
    }

    // Nested end over a DELEGATECALL-initiated call propagates mutation
    // annotations onto the resuming state; the check must look at the
    // opcode sitting at the resuming state's own PC, not at whatever opcode
    // the callee ended its transaction on.
    #[test]
    fn delegatecall_initiated_nested_end_propagates_mutation_annotations() {
        let mut engine = test_engine(Box::new(CallThenEndEvaluator { revert: false }));
        let root = engine.cfg.root_node("Target");
        let caller_address = Address::zero();

        let caller_state = seed_state(
            root,
            code_single_opcode(Opcode::DelegateCall),
            caller_address,
        );

        let (mut successors, opcode) = engine.execute_state(caller_state);
        assert_eq!(opcode, Some(Opcode::DelegateCall));
        engine.manage_cfg(opcode.expect("opcode"), &mut successors, &Disassembly::new());

        let mut child = successors.remove(0);
        let callee_address = child.environment.active_account;
        child.world_state.account_mut(callee_address).code = code_single_opcode(Opcode::Call);
        child.annotations.push(Box::new(crate::annotation::MutationAnnotation {
            description: "storage write".into(),
        }));

        let (successors, _opcode) = engine.execute_state(child);
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].annotations.iter().count(), 1);
    }

    // The same scenario over a plain CALL must not propagate annotations.
    #[test]
    fn plain_call_initiated_nested_end_does_not_propagate_annotations() {
        let mut engine = test_engine(Box::new(CallThenEndEvaluator { revert: false }));
        let root = engine.cfg.root_node("Target");
        let caller_address = Address::zero();

        let caller_state = seed_state(root, code_single_opcode(Opcode::Call), caller_address);

        let (mut successors, opcode) = engine.execute_state(caller_state);
        engine.manage_cfg(opcode.expect("opcode"), &mut successors, &Disassembly::new());

        let mut child = successors.remove(0);
        let callee_address = child.environment.active_account;
        child.world_state.account_mut(callee_address).code = code_single_opcode(Opcode::Call);
        child.annotations.push(Box::new(crate::annotation::MutationAnnotation {
            description: "storage write".into(),
        }));

        let (successors, _opcode) = engine.execute_state(child);
        assert_eq!(successors.len(), 1);
        assert_eq!(successors[0].annotations.iter().count(), 0);
    }

    struct ConstantScorePlugin;
    impl crate::worklist::CoveragePlugin for ConstantScorePlugin {
        fn score(&self, state: &GlobalState) -> i64 {
            state.mstate.pc as i64
        }
    }

    // enable_coverage_strategy wraps the default strategy with the supplied
    // plugin at construction time.
    #[test]
    fn enable_coverage_strategy_wraps_strategy_with_supplied_plugin() {
        let mut config = SessionConfig::new();
        config.enable_coverage_strategy = true;
        let mut engine = Engine::new(
            config,
            Box::new(NaiveBackend),
            Box::new(UnreachableEvaluator),
            Box::new(NullDynamicLoader),
            Box::new(NullVulnerabilityCollaborator),
            Some(Box::new(ConstantScorePlugin)),
        );
        let root = engine.cfg.root_node("Target");

        let mut low = seed_state(root, Bytes::new(), Address::zero());
        low.mstate.pc = 1;
        let mut high = seed_state(root, Bytes::new(), Address::zero());
        high.mstate.pc = 5;
        engine.worklist.push(low);
        engine.worklist.push(high);

        let picked = engine
            .strategy
            .next_state(&mut engine.worklist)
            .expect("one state available");
        assert_eq!(picked.mstate.pc, 5);
    }

    // enable_coverage_strategy without a plugin falls back to the default
    // strategy rather than failing construction.
    #[test]
    fn enable_coverage_strategy_without_plugin_falls_back_to_default() {
        let mut config = SessionConfig::new();
        config.enable_coverage_strategy = true;
        let mut engine = Engine::new(
            config,
            Box::new(NaiveBackend),
            Box::new(UnreachableEvaluator),
            Box::new(NullDynamicLoader),
            Box::new(NullVulnerabilityCollaborator),
            None,
        );
        let root = engine.cfg.root_node("Target");
        engine
            .worklist
            .push(seed_state(root, Bytes::new(), Address::zero()));

        assert!(engine.strategy.next_state(&mut engine.worklist).is_some());
    }
}
