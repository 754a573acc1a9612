//! Per-run context: output directory and drain policy.
//!
//! Everything the original kept in module-level globals (current options,
//! output directory, exit hooks) lives here instead and travels with the
//! run it belongs to.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Bounds on the drain protocol's waits.
#[derive(Debug, Clone, Copy)]
pub struct DrainPolicy {
    /// Simulated ticks a single drain barrier may consume before the wait
    /// is abandoned. `None` waits indefinitely (the original behavior).
    pub deadline_ticks: Option<u64>,
    /// Tick budget per `simulate` call while waiting on a barrier; the
    /// cancel token and deadline are checked between slices.
    pub slice_ticks: u64,
    /// Upper bound on drain passes before the whole-graph drain is declared
    /// stalled.
    pub max_passes: usize,
}

impl Default for DrainPolicy {
    fn default() -> Self {
        Self {
            deadline_ticks: None,
            slice_ticks: 1_000,
            max_passes: 64,
        }
    }
}

/// Cooperative cancellation flag shared with whoever may abort a drain.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Context for one run of the simulator.
#[derive(Debug, Clone)]
pub struct RunContext {
    out_dir: PathBuf,
    drain: DrainPolicy,
    cancel: CancelToken,
}

impl RunContext {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            drain: DrainPolicy::default(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_drain_policy(mut self, drain: DrainPolicy) -> Self {
        self.drain = drain;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn drain_policy(&self) -> DrainPolicy {
        self.drain
    }

    /// Clone of the token that cancels this run's drain waits.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
