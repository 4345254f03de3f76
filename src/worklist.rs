//! Worklist and strategy: an ordered reservoir of pending states and a
//! pluggable selection policy.

use crate::state::GlobalState;

/// The shared reservoir of pending execution states.
pub type Worklist = Vec<GlobalState>;

/// An externally supplied stateful producer that, given the shared worklist,
/// yields the next state to execute or signals it is done. Modeled as an
/// explicit `next` method rather than `std::iter::Iterator` because it
/// mutates a worklist it does not own.
pub trait WorklistStrategy {
    /// Removes and returns the next state to execute, or `None` when the
    /// worklist is exhausted.
    fn next_state(&mut self, worklist: &mut Worklist) -> Option<GlobalState>;
}

/// Depth-first (LIFO) search — the default policy.
///
/// States whose transaction-stack-implied depth exceeds `max_depth` are
/// skipped (dropped) rather than yielded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthFirstSearchStrategy {
    pub max_depth: Option<usize>,
}

impl DepthFirstSearchStrategy {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self { max_depth }
    }

    fn within_depth(&self, state: &GlobalState) -> bool {
        self.max_depth.is_none_or(|max| state.depth() <= max)
    }
}

impl WorklistStrategy for DepthFirstSearchStrategy {
    fn next_state(&mut self, worklist: &mut Worklist) -> Option<GlobalState> {
        while let Some(state) = worklist.pop() {
            if self.within_depth(&state) {
                return Some(state);
            }
        }
        None
    }
}

/// Breadth-first (FIFO) search, offered alongside the depth-first default
/// since swapping the pop end is the entire difference between the two
/// (same depth-bound skipping behaviour).
#[derive(Debug, Clone, Copy, Default)]
pub struct BreadthFirstSearchStrategy {
    pub max_depth: Option<usize>,
}

impl WorklistStrategy for BreadthFirstSearchStrategy {
    fn next_state(&mut self, worklist: &mut Worklist) -> Option<GlobalState> {
        loop {
            if worklist.is_empty() {
                return None;
            }
            let state = worklist.remove(0);
            let within_depth = self
                .max_depth
                .is_none_or(|max| state.depth() <= max);
            if within_depth {
                return Some(state);
            }
        }
    }
}

/// Scores a candidate state for the coverage-guided wrapper. An external
/// collaborator, wired in through `enable_coverage_strategy` and an
/// instruction-level plugin the caller supplies.
pub trait CoveragePlugin {
    /// Higher is more interesting; the wrapper prefers high-scoring states.
    fn score(&self, state: &GlobalState) -> i64;
}

/// Lets a boxed trait object stand in for `P: CoveragePlugin`, so
/// `Engine::new` can wrap its strategy with a plugin supplied as
/// `Box<dyn CoveragePlugin>` without knowing its concrete type.
impl CoveragePlugin for Box<dyn CoveragePlugin> {
    fn score(&self, state: &GlobalState) -> i64 {
        (**self).score(state)
    }
}

/// Wraps an inner strategy, reordering the worklist by coverage score before
/// delegating selection — composition over inheritance, so any strategy can
/// be coverage-wrapped without a new type per combination.
pub struct CoverageStrategy<P: CoveragePlugin> {
    inner: Box<dyn WorklistStrategy>,
    plugin: P,
}

impl<P: CoveragePlugin> CoverageStrategy<P> {
    pub fn new(inner: Box<dyn WorklistStrategy>, plugin: P) -> Self {
        Self { inner, plugin }
    }
}

impl<P: CoveragePlugin> WorklistStrategy for CoverageStrategy<P> {
    fn next_state(&mut self, worklist: &mut Worklist) -> Option<GlobalState> {
        worklist.sort_by_key(|s| self.plugin.score(s));
        self.inner.next_state(worklist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::NodeId;
    use crate::state::{Environment, MachineState, WorldState};
    use crate::annotation::AnnotationBag;

    fn dummy_state(depth: usize) -> GlobalState {
        GlobalState {
            world_state: WorldState::new(),
            environment: Environment::default(),
            mstate: MachineState::new(),
            node: NodeId(0),
            transaction_stack: (0..depth)
                .map(|_| {
                    (
                        crate::state::TransactionKind::MessageCall(Default::default()),
                        None,
                    )
                })
                .collect(),
            last_return_data: None,
            annotations: AnnotationBag::new(),
        }
    }

    #[test]
    fn depth_first_pops_last_pushed_first() {
        let mut worklist = vec![dummy_state(0), dummy_state(0)];
        let mut strategy = DepthFirstSearchStrategy::new(None);
        assert!(strategy.next_state(&mut worklist).is_some());
        assert!(strategy.next_state(&mut worklist).is_some());
        assert!(strategy.next_state(&mut worklist).is_none());
    }

    #[test]
    fn states_beyond_max_depth_are_skipped() {
        let mut worklist = vec![dummy_state(5), dummy_state(1)];
        let mut strategy = DepthFirstSearchStrategy::new(Some(2));
        let picked = strategy.next_state(&mut worklist).expect("one state fits");
        assert_eq!(picked.depth(), 1);
        assert!(strategy.next_state(&mut worklist).is_none());
    }
}
