//! laser-svm — a worklist-driven symbolic execution engine for EVM-style
//! contract bytecode.
//!
//! This crate is the exploration core: it interprets every reachable
//! instruction of a contract under symbolic sender/calldata/value/storage,
//! branches at control-flow decisions, and accumulates path constraints for
//! an external SMT backend. The output is a set of explored world states
//! and, optionally, a recorded control-flow graph.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             Engine                                │
//! │  ┌───────────┐  ┌────────────┐  ┌───────────────┐  ┌──────────┐ │
//! │  │ worklist  │  │   hooks    │  │      cfg       │  │  keccak  │ │
//! │  └───────────┘  └────────────┘  └───────────────┘  └──────────┘ │
//! │         execute_state → transaction lifecycle → manage_cfg        │
//! └──────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼  (traits in `evaluator`)
//!        opcode semantics · SMT solver · dynamic loader · detectors
//! ```
//!
//! # Out of scope
//!
//! Per-opcode semantics, the SMT term algebra/solver, dynamic chain
//! loading, the contract-creation driver, disassembly, and vulnerability
//! detection are all external collaborators reached through the traits in
//! [`evaluator`]. This crate does not parse CLI flags or do I/O; see
//! [`config::SessionConfig`] for the plain-data knobs it does own.

pub mod annotation;
pub mod cfg;
pub mod config;
pub mod constraints;
pub mod engine;
pub mod errors;
pub mod evaluator;
pub mod hooks;
pub mod keccak;
pub mod opcode;
pub mod profiler;
pub mod smt;
pub mod state;
pub mod worklist;

pub use config::SessionConfig;
pub use engine::{Engine, SymExecMode};
pub use errors::{HookSignal, SvmError};
