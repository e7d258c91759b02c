pub mod decode;
pub mod encode;
pub mod packet;

pub use decode::DecodeError;
pub use encode::EncodeError;
pub use packet::PacketError;
