use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Please enter a video URL")]
    InvalidInput,

    #[error("A download is already in progress")]
    Busy,

    #[error("Download failed: {0}")]
    Engine(String),

    #[error("Could not open {0}")]
    Shell(String),

    #[error("I/O error: {0}")]
    Io(String),
}
