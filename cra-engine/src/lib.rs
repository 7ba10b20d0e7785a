//! Cost/latency-aware cache replacement simulation engine.
//!
//! [`block::CraBlock`] is the benefit-bucketed rank-eviction store at the
//! core of everything here. [`policy::window::WindowCa`] wraps three of
//! them into a Window/Probation/Protected SLRU with TinyLFU admission,
//! and [`policy::adaptive::AdaptiveCa`] adds a hill-climber that resizes
//! the Window/Main boundary as a trace's access pattern shifts.
//!
//! [`trace`] holds the on-disk format parsers; [`admission`] the
//! frequency sketches TinyLFU admission is built on; [`stats`] the sink a
//! policy reports hit/miss/eviction signals to.

pub mod admission;
pub mod block;
pub mod error;
pub mod event;
pub mod normalization;
pub mod policy;
pub mod stats;
pub mod trace;

pub use block::CraBlock;
pub use error::{EngineError, Result};
pub use event::{AccessEvent, Node};
pub use policy::adaptive::AdaptiveCa;
pub use policy::climber::{Adaptation, Climber, ClimberConfig};
pub use policy::window::WindowCa;
pub use policy::PolicyConfig;
pub use stats::{CountingSink, NullSink, Report, Segment, StatsSink};
