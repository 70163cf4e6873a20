//! Error types for spicenet-core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("subcircuit {name} is already defined with different content")]
    DuplicateSubcircuitName { name: String },

    #[error("instance {instance} references undefined subcircuit {name}")]
    UndefinedSubcircuit { instance: String, name: String },

    #[error("instance {instance} connects {found} nodes but subcircuit {name} has {expected} ports")]
    PortArityMismatch {
        instance: String,
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("recursive subcircuit instantiation: {}", chain.join(" -> "))]
    RecursiveSubcircuit { chain: Vec<String> },
}

pub type Result<T> = std::result::Result<T, Error>;
