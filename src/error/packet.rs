use thiserror::Error;

use super::{decode::DecodeError, encode::EncodeError};

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("Bad frame: {0}")]
    BadFrame(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
}
