use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetflowError {
    #[error("No file or URL provided")]
    InputMissing,

    #[error("Failed to fetch remote resource: {0}")]
    Fetch(String),

    #[error("Failed to process CSV: {0}")]
    Transform(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArtifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SheetflowError>;
