use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::engine::{EngineError, ExitCause};

/// Errors surfaced by the lifecycle layer.
///
/// Configuration and engine errors are fatal to the run; the drain variants
/// report a barrier that could not be satisfied, which the caller may treat
/// as retryable.
#[derive(Debug, Error)]
pub enum LifeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("drain did not settle after {passes} passes")]
    DrainStalled { passes: usize },

    #[error(
        "drain barrier not satisfied within {deadline} ticks ({remaining} still outstanding)"
    )]
    DrainDeadline { deadline: u64, remaining: u64 },

    #[error("drain cancelled at tick {tick}")]
    DrainCancelled { tick: u64 },

    #[error("engine exited ({cause}) at tick {tick} with the drain barrier unsatisfied")]
    DrainInterrupted { cause: ExitCause, tick: u64 },

    #[error("checkpoint at {} was taken for a different topology", dir.display())]
    TopologyMismatch { dir: PathBuf },

    #[error("output i/o: {0}")]
    Io(#[from] std::io::Error),
}
