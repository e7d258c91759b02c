/// Binary stream codec: wire types, descriptors, encoder, decoder.
pub mod codec;
/// Common error types: encoding, decoding, packet framing.
pub mod error;
/// RPC packet framing: request/response envelopes over the codec.
pub mod packet;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Codec streams and the logical type model.
pub use codec::{
    EnumDescriptor, FieldDescriptor, FieldType, StructDescriptor, StructMap, StructValue,
    TarsDecoder, TarsEncoder, Token, TokenValue, Value, WireType,
};
/// Operation errors.
pub use error::{DecodeError, EncodeError, PacketError};
/// Packet envelopes and protocol constants.
pub use packet::{consts, RequestPacket, ResponsePacket};
