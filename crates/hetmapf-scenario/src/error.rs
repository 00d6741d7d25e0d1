use hetmapf_core::CoreError;
use hetmapf_grid::GridError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("scenario references fleet {0} which was never declared")]
    UnknownFleet(usize),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("I/O error reading scenario: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScenarioResult<T> = Result<T, ScenarioError>;
