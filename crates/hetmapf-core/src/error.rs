//! Workspace error type.
//!
//! Sub-crates define their own error enums and either convert into
//! `CoreError` via `From` impls or wrap it as one variant.  Both patterns
//! are acceptable; prefer whichever keeps error sites clean.

use thiserror::Error;

use crate::AgentId;

/// The top-level error type for `hetmapf-core` and a common base for
/// sub-crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("agent {0} has no start vertex on its fleet graph")]
    MissingStart(AgentId),

    #[error("agent {0} has no goal vertex on its fleet graph")]
    MissingGoal(AgentId),

    #[error("agents {0} and {1} overlap at base cell {2} in the {3} configuration")]
    FootprintOverlap(AgentId, AgentId, usize, &'static str),

    #[error("agent {0} cannot reach its goal on its fleet graph")]
    UnreachableGoal(AgentId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for all `hetmapf-*` crates.
pub type CoreResult<T> = Result<T, CoreError>;
