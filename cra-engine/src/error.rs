//! Error taxonomy for the engine.
//!
//! Unrepresentable trace input (oversized weight, NaN penalties) is *not*
//! an error case here -- it is silently dropped at the call site with no
//! state change, per the trace-replay convention the engine follows.
//! What lands in [`EngineError`] are the two taxa that are genuinely
//! fatal to a simulation run: an invariant a policy itself is supposed to
//! uphold breaking, and a configuration that names something the engine
//! does not know how to build.

use thiserror::Error;

/// Fatal engine errors. A run that produces one of these should stop, not
/// retry or repair -- traces are replayed once.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A structural invariant (e.g. `find_victim` returning nothing while
    /// the block is non-empty, or a segment-size drift in a three-segment
    /// policy) was violated. This is a programming error, not a data
    /// issue.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The configuration named a frequency sketch the engine has no
    /// constructor for.
    #[error("unknown frequency sketch: {0}")]
    UnknownSketch(String),

    /// The configuration named a climber strategy the engine has no
    /// constructor for.
    #[error("unknown climber strategy: {0}")]
    UnknownStrategy(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
