use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("map file has no `{0}` header line")]
    MissingHeader(&'static str),

    #[error("map dimensions {width}x{height} are invalid")]
    BadDimensions { width: usize, height: usize },

    #[error("tile size {0} must be at least 1")]
    BadCellSize(u32),

    #[error("I/O error reading map: {0}")]
    Io(#[from] std::io::Error),
}

pub type GridResult<T> = Result<T, GridError>;
