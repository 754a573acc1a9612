//! Lifecycle coordination: instantiation, drain, checkpoint, switchover.

mod checkpoint;
mod context;
mod drain;
mod error;
mod instantiate;
mod switchover;

pub use context::{CancelToken, DrainPolicy, RunContext};
pub use error::LifeError;
pub use instantiate::{RunState, RunningGraph, instantiate};
