use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Tag not match: {0}")]
    TagNotMatch(String),

    #[error("Type not match: {0}")]
    TypeNotMatch(String),

    #[error("Stream length not match: requested {requested} bytes, {remaining} remaining")]
    LengthNotMatch { requested: usize, remaining: usize },

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid UTF-8 in string payload: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}
