use hetmapf_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The instance failed validation; the planner refuses to run.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// A produced plan violates a joint-motion invariant.
    #[error("infeasible solution: {0}")]
    Infeasible(String),
}

pub type SearchResult<T> = Result<T, SearchError>;
