//! Boundary with the native simulation engine.
//!
//! The engine proper (event scheduling, timing models, component behavior)
//! is opaque to the coordination layer and reached only through the
//! [`Engine`] trait. [`LocalEngine`] is a small in-process reference
//! implementation used by the demo binary and the test suite.

mod api;
mod exit;
mod handle;
mod local;

pub use api::{Engine, EngineError, PathResolver, TimingMode};
pub use exit::{ExitCause, ExitEvent};
pub use handle::{BarrierHandle, NativeHandle};
pub use local::{LocalEngine, SimComponent};
