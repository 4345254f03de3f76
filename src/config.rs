//! Session configuration.
//!
//! Plain data, not a CLI: parsing flags into a `SessionConfig` is a binary's
//! job, not this crate's.

use crate::keccak::default_actor_roster;
use crate::smt::BitVec;
use crate::worklist::{DepthFirstSearchStrategy, WorklistStrategy};
use std::time::Duration;

/// Tunables for a `sym_exec` campaign. Use the `with_*` builders to override
/// one field at a time.
#[derive(Clone)]
pub struct SessionConfig {
    pub max_depth: Option<usize>,
    /// `None` disables the deadline.
    pub execution_timeout: Option<Duration>,
    pub create_timeout: Option<Duration>,
    pub transaction_count: usize,
    pub requires_statespace: bool,
    pub enable_iprof: bool,
    pub enable_coverage_strategy: bool,
    pub actor_roster: Vec<BitVec>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            execution_timeout: Some(Duration::from_secs(60)),
            create_timeout: Some(Duration::from_secs(10)),
            transaction_count: 2,
            requires_statespace: true,
            enable_iprof: false,
            enable_coverage_strategy: false,
            actor_roster: default_actor_roster(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn with_create_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn with_transaction_count(mut self, count: usize) -> Self {
        self.transaction_count = count;
        self
    }

    pub fn with_requires_statespace(mut self, requires: bool) -> Self {
        self.requires_statespace = requires;
        self
    }

    pub fn with_enable_iprof(mut self, enable: bool) -> Self {
        self.enable_iprof = enable;
        self
    }

    pub fn with_enable_coverage_strategy(mut self, enable: bool) -> Self {
        self.enable_coverage_strategy = enable;
        self
    }

    pub fn with_actor_roster(mut self, roster: Vec<BitVec>) -> Self {
        self.actor_roster = roster;
        self
    }

    /// Builds the default strategy for this configuration (depth-first,
    /// bounded by `max_depth`). The coverage wrapper, if enabled, is applied
    /// by the caller since it needs an externally supplied `CoveragePlugin`.
    pub fn default_strategy(&self) -> Box<dyn WorklistStrategy> {
        Box::new(DepthFirstSearchStrategy::new(self.max_depth))
    }
}
