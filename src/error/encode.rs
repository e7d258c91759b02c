use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Required field absent: {0}")]
    MissingRequired(String),

    #[error("I/O error during encoding: {0}")]
    IoError(#[from] std::io::Error),
}
