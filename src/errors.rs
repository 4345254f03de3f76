//! Error and control-flow-signal types for the engine.
//!
//! `SvmError` is the only type that aborts a campaign. Everything else
//! that looks like an error — VM exceptions,
//! transaction start/end signals, plugin vetoes — is modeled as a plain enum
//! value returned from a trait method, not as something thrown and caught.

use thiserror::Error;

/// Fatal errors. Propagation stops the driver and aborts the campaign.
#[derive(Debug, Error)]
pub enum SvmError {
    /// Invalid session parameters: both (or neither) of the two `sym_exec`
    /// modes were supplied, or an unknown hook kind was registered.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An internal invariant described in the data model was violated.
    #[error("internal invariant broken: {0}")]
    Internal(String),
}

/// Cooperative veto raised by a hook to suppress a successor or a world-state
/// commit. Caught only at the call sites that run hooks, never elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSignal {
    /// Raised by a pre-hook or a post-hook: drop the current state / successor.
    SkipState,
    /// Raised by an `add_world_state` hook: do not commit to `open_states`.
    SkipWorldState,
}
