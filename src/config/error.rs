use thiserror::Error;

use super::node::ComponentFamily;

/// Configuration errors: detected before any engine state is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate component name {name:?} under {parent}")]
    DuplicateChild { parent: String, name: String },

    #[error("missing required parameter {param:?} on {path}")]
    MissingParam { path: String, param: String },

    #[error("no port {port:?} declared on {path}")]
    NoSuchPort { path: String, port: String },

    #[error("port {port:?} on {path} targets {peer_path}:{peer_port}, which is not declared")]
    UnresolvedPort {
        path: String,
        port: String,
        peer_path: String,
        peer_port: String,
    },

    #[error("parameter {param:?} on {path} references a node outside this graph")]
    DanglingNodeRef { path: String, param: String },

    #[error("root clock parameter must be a positive number, got {got}")]
    BadClock { got: String },

    #[error(
        "switchover pair {old} -> {new} mixes families {old_family:?} and {new_family:?}"
    )]
    FamilyMismatch {
        old: String,
        new: String,
        old_family: ComponentFamily,
        new_family: ComponentFamily,
    },

    #[error("{path} cannot take part in a switchover")]
    NotSwitchable { path: String },
}
