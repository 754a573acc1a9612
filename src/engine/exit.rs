use std::fmt;

/// Why a `simulate` call returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitCause {
    /// The active drain barrier reached zero.
    DrainComplete,
    /// The tick budget passed to `simulate` was exhausted.
    TickLimit,
    /// No component has runnable work left.
    Idle,
    /// Engine-specific exit (user interrupt, breakpoint, ...).
    Other(String),
}

impl fmt::Display for ExitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCause::DrainComplete => f.write_str("drain complete"),
            ExitCause::TickLimit => f.write_str("tick limit reached"),
            ExitCause::Idle => f.write_str("no runnable work"),
            ExitCause::Other(s) => f.write_str(s),
        }
    }
}

/// Result of running the engine's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitEvent {
    pub cause: ExitCause,
    pub tick: u64,
}
