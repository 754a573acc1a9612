//! The call interface every native engine must expose.

use std::path::Path;

use thiserror::Error;

use crate::config::{ConfigNode, NodeIndex};

use super::exit::ExitEvent;
use super::handle::{BarrierHandle, NativeHandle};

/// Path -> node lookup handed to the engine while it loads the description.
pub type PathResolver<'a> = dyn Fn(&str) -> Option<NodeIndex> + 'a;

/// Memory-system timing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingMode {
    Atomic,
    Timing,
}

/// Errors surfaced by the native engine. Not locally recoverable: the
/// coordination layer propagates them as fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("create failed for {path}: {reason}")]
    Create { path: String, reason: String },

    #[error("no port {port:?} on native object {handle:?}")]
    NoSuchPort { handle: NativeHandle, port: String },

    #[error("stale or unknown handle {0:?}")]
    StaleHandle(NativeHandle),

    #[error("engine rejected description: {0}")]
    Description(String),

    #[error("component state i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("component state encoding: {0}")]
    State(#[from] serde_json::Error),
}

/// Operations the coordination layer issues against the native engine.
///
/// Calls are serialized by the caller; the engine's only concurrent
/// activity is its own modeled components advancing in simulated time
/// inside `simulate`.
pub trait Engine {
    fn set_output_dir(&mut self, dir: &Path) -> Result<(), EngineError>;

    /// Load the rendered graph description. The resolver maps section paths
    /// back to config nodes.
    fn load_description(
        &mut self,
        text: &str,
        resolver: &PathResolver<'_>,
    ) -> Result<(), EngineError>;

    /// Materialize the native object for one config node.
    fn create_object(
        &mut self,
        idx: NodeIndex,
        node: &ConfigNode,
        path: &str,
    ) -> Result<NativeHandle, EngineError>;

    /// Wire one directed port reference. Both endpoints must already exist.
    fn connect_port(
        &mut self,
        from: NativeHandle,
        port: &str,
        to: NativeHandle,
        peer_port: &str,
    ) -> Result<(), EngineError>;

    /// Post-construction fixups that need the whole graph wired.
    fn final_init(&mut self) -> Result<(), EngineError>;

    /// Advance the event loop. `max_ticks` bounds the advance relative to
    /// the current tick; `None` runs until an engine-chosen exit condition.
    fn simulate(&mut self, max_ticks: Option<u64>) -> Result<ExitEvent, EngineError>;

    fn cur_tick(&self) -> u64;

    fn create_drain_barrier(&mut self) -> BarrierHandle;
    fn set_barrier_count(&mut self, barrier: BarrierHandle, count: u64);
    fn barrier_count(&self, barrier: BarrierHandle) -> u64;
    fn cleanup_drain_barrier(&mut self, barrier: BarrierHandle);

    /// Ask a component (and, if `recursive`, its whole subtree) to begin
    /// draining. Returns the number of asynchronous sub-activities that must
    /// still quiesce; each will decrement the barrier as it does.
    fn start_drain(
        &mut self,
        target: NativeHandle,
        barrier: BarrierHandle,
        recursive: bool,
    ) -> Result<u64, EngineError>;

    /// Leave the drained state and run normally again.
    fn resume(&mut self, target: NativeHandle, recursive: bool) -> Result<(), EngineError>;

    /// Detach a drained component from the simulated machine.
    fn switch_out(&mut self, target: NativeHandle) -> Result<(), EngineError>;

    /// Transfer architectural and microarchitectural state from `old` into
    /// `new`. Both must be quiescent.
    fn take_over_from(
        &mut self,
        new: NativeHandle,
        old: NativeHandle,
    ) -> Result<(), EngineError>;

    fn change_timing(&mut self, mode: TimingMode) -> Result<(), EngineError>;

    /// Serialize every component's state to files under `dir`.
    fn serialize_all(&mut self, dir: &Path) -> Result<(), EngineError>;

    /// Restore every component's state from files under `dir`. Components
    /// and ports must already exist; only internal state is loaded.
    fn unserialize_all(&mut self, dir: &Path) -> Result<(), EngineError>;
}
