//! Hook registry: per-opcode pre/post hooks and the six lifecycle hook
//! sets, with the two cooperative veto signals.
//!
//! Registration is append-only; invocation order equals registration order
//! within each bucket. Veto signals are caught only at the call sites
//! below, never elsewhere — anything else a hook returns as an error is not
//! modeled here, since a hook either succeeds or vetoes.

use crate::errors::HookSignal;
use crate::opcode::Opcode;
use crate::state::GlobalState;
use rustc_hash::FxHashMap;

/// A per-opcode pre/post hook. Most implementations only care about one of
/// the two call sites; the other is a no-op by default.
pub trait OpcodeHook {
    /// Runs before the instruction evaluator sees `state`. Vetoing here
    /// commits `state` as a terminal open world state.
    fn pre(&mut self, state: &mut GlobalState) -> Result<(), HookSignal> {
        let _ = state;
        Ok(())
    }

    /// Runs once per successor produced by a step. Vetoing drops just that
    /// successor from the list.
    fn post(&mut self, state: &mut GlobalState) -> Result<(), HookSignal> {
        let _ = state;
        Ok(())
    }
}

/// Which bucket a per-opcode hook registers into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Pre,
    Post,
}

/// A callback tied to session- or transaction-scope events rather than to
/// any opcode. Every method defaults to a no-op so a hook only needs to
/// override the events it cares about.
pub trait LifecycleHook {
    fn start_sym_exec(&mut self) {}
    fn stop_sym_exec(&mut self) {}
    fn start_sym_trans(&mut self) {}
    fn stop_sym_trans(&mut self) {}
    fn execute_state(&mut self, state: &mut GlobalState) {
        let _ = state;
    }
    /// May veto with `SkipWorldState`: the candidate is not added to
    /// `open_states`.
    fn add_world_state(&mut self, state: &mut GlobalState) -> Result<(), HookSignal> {
        let _ = state;
        Ok(())
    }
}

/// Owns both hook surfaces and dispatches them at the call sites named in
/// the instruction step and transaction lifecycle.
#[derive(Default)]
pub struct HookRegistry {
    pre: FxHashMap<Opcode, Vec<Box<dyn OpcodeHook>>>,
    post: FxHashMap<Opcode, Vec<Box<dyn OpcodeHook>>>,
    lifecycle: Vec<Box<dyn LifecycleHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `hook` to the `opcode` bucket of `kind`. Registration order is
    /// preserved within the bucket.
    pub fn register_hooks(&mut self, kind: HookKind, opcode: Opcode, hook: Box<dyn OpcodeHook>) {
        let table = match kind {
            HookKind::Pre => &mut self.pre,
            HookKind::Post => &mut self.post,
        };
        table.entry(opcode).or_default().push(hook);
    }

    /// Appends `hook` to the lifecycle hook list. A single hook may
    /// implement any subset of the six events.
    pub fn register_lifecycle_hook(&mut self, hook: Box<dyn LifecycleHook>) {
        self.lifecycle.push(hook);
    }

    /// Runs every registered pre-hook for `opcode` in order. The first veto
    /// short-circuits the rest (mirrors `PluginSkipState` propagating out of
    /// once the first hook vetoes, none of its siblings run).
    pub fn run_pre(&mut self, opcode: Opcode, state: &mut GlobalState) -> Result<(), HookSignal> {
        if let Some(hooks) = self.pre.get_mut(&opcode) {
            for hook in hooks {
                hook.pre(state)?;
            }
        }
        Ok(())
    }

    /// Runs every registered post-hook for `opcode` against each surviving
    /// successor, dropping any successor a hook vetoes. Unlike `run_pre`,
    /// one state's veto does not stop hooks from running against its
    /// siblings (mirrors the nested removal loop in `_execute_post_hook`).
    pub fn run_post(&mut self, opcode: Opcode, states: &mut Vec<GlobalState>) {
        let Some(hooks) = self.post.get_mut(&opcode) else {
            return;
        };
        for hook in hooks {
            let mut kept = Vec::with_capacity(states.len());
            for mut state in states.drain(..) {
                if hook.post(&mut state).is_ok() {
                    kept.push(state);
                }
            }
            *states = kept;
        }
    }

    /// Runs the `opcode` post-hooks against a single state for their side
    /// effects only, ignoring any veto — used when a state is already
    /// committed to a particular fate (an exception or a transaction end)
    /// and a hook's veto wouldn't change the outcome.
    pub fn run_post_side_effect(&mut self, opcode: Opcode, state: &mut GlobalState) {
        if let Some(hooks) = self.post.get_mut(&opcode) {
            for hook in hooks {
                let _ = hook.post(state);
            }
        }
    }

    pub fn fire_start_sym_exec(&mut self) {
        for hook in &mut self.lifecycle {
            hook.start_sym_exec();
        }
    }

    pub fn fire_stop_sym_exec(&mut self) {
        for hook in &mut self.lifecycle {
            hook.stop_sym_exec();
        }
    }

    pub fn fire_start_sym_trans(&mut self) {
        for hook in &mut self.lifecycle {
            hook.start_sym_trans();
        }
    }

    pub fn fire_stop_sym_trans(&mut self) {
        for hook in &mut self.lifecycle {
            hook.stop_sym_trans();
        }
    }

    pub fn fire_execute_state(&mut self, state: &mut GlobalState) {
        for hook in &mut self.lifecycle {
            hook.execute_state(state);
        }
    }

    /// Runs the `add_world_state` hooks in order; the first veto stops the
    /// rest and the candidate is not committed.
    pub fn fire_add_world_state(&mut self, state: &mut GlobalState) -> Result<(), HookSignal> {
        for hook in &mut self.lifecycle {
            hook.add_world_state(state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::NodeId;
    use crate::state::{Environment, MachineState, WorldState};
    use crate::annotation::AnnotationBag;

    fn dummy_state() -> GlobalState {
        GlobalState {
            world_state: WorldState::new(),
            environment: Environment::default(),
            mstate: MachineState::new(),
            node: NodeId(0),
            transaction_stack: Vec::new(),
            last_return_data: None,
            annotations: AnnotationBag::new(),
        }
    }

    struct VetoOnFirstCall {
        calls: usize,
    }

    impl OpcodeHook for VetoOnFirstCall {
        fn pre(&mut self, _state: &mut GlobalState) -> Result<(), HookSignal> {
            self.calls += 1;
            Err(HookSignal::SkipState)
        }
    }

    #[test]
    fn pre_hook_veto_short_circuits() {
        let mut registry = HookRegistry::new();
        registry.register_hooks(
            HookKind::Pre,
            Opcode::Sstore,
            Box::new(VetoOnFirstCall { calls: 0 }),
        );
        let mut state = dummy_state();
        let result = registry.run_pre(Opcode::Sstore, &mut state);
        assert_eq!(result, Err(HookSignal::SkipState));
    }

    struct RejectEverything;
    impl OpcodeHook for RejectEverything {
        fn post(&mut self, _state: &mut GlobalState) -> Result<(), HookSignal> {
            Err(HookSignal::SkipState)
        }
    }

    #[test]
    fn post_hook_veto_drops_only_that_successor() {
        let mut registry = HookRegistry::new();
        registry.register_hooks(HookKind::Post, Opcode::Jump, Box::new(RejectEverything));
        let mut states = vec![dummy_state(), dummy_state()];
        registry.run_post(Opcode::Jump, &mut states);
        assert!(states.is_empty());
    }

    #[test]
    fn lifecycle_hooks_fire_in_registration_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct OrderRecorder {
            log: Rc<RefCell<Vec<u8>>>,
            id: u8,
        }
        impl LifecycleHook for OrderRecorder {
            fn start_sym_exec(&mut self) {
                self.log.borrow_mut().push(self.id);
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.register_lifecycle_hook(Box::new(OrderRecorder {
            log: log.clone(),
            id: 1,
        }));
        registry.register_lifecycle_hook(Box::new(OrderRecorder {
            log: log.clone(),
            id: 2,
        }));
        registry.fire_start_sym_exec();
        assert_eq!(*log.borrow(), vec![1, 2]);
    }
}
