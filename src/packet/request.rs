// Copyright 2025 Tarsio

//! Конверт RPC-запроса.

use super::{read_string_map, required, strip_frame, write_string_map};
use crate::{
    codec::{TarsDecoder, TarsEncoder},
    error::PacketError,
};

/// Пакет запроса: фиксированная структура Tars с тегами 1–10.
///
/// `buffer` — непрозрачная полезная нагрузка, сама по себе
/// Tars-кодированная, переносится как вектор байтов. Словари
/// `context` и `status` — строковые метаданные боковых каналов.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestPacket {
    pub version: i16,
    pub packet_type: i8,
    pub message_type: i32,
    pub request_id: i32,
    pub servant_name: String,
    pub func_name: String,
    pub buffer: Vec<u8>,
    pub timeout: i32,
    pub context: Vec<(String, String)>,
    pub status: Vec<(String, String)>,
}

impl RequestPacket {
    /// Кодирует пакет в полный кадр с префиксом длины.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let mut enc = TarsEncoder::with_length_header();
        enc.write_int16(1, self.version)?;
        enc.write_int8(2, self.packet_type)?;
        enc.write_int32(3, self.message_type)?;
        enc.write_int32(4, self.request_id)?;
        enc.write_string(5, &self.servant_name)?;
        enc.write_string(6, &self.func_name)?;
        enc.write_bytes(7, &self.buffer)?;
        enc.write_int32(8, self.timeout)?;
        write_string_map(&mut enc, 9, &self.context)?;
        write_string_map(&mut enc, 10, &self.status)?;
        Ok(enc.into_bytes())
    }

    /// Декодирует полный кадр, пропуская префикс длины.
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let body = strip_frame(data)?;
        let mut dec = TarsDecoder::new(body);

        let version = required(dec.read_int16(1, true)?, "version")?;
        let packet_type = required(dec.read_int8(2, true)?, "packet type")?;
        let message_type = required(dec.read_int32(3, true)?, "message type")?;
        let request_id = required(dec.read_int32(4, true)?, "request id")?;
        let servant_name = required(dec.read_string(5, true)?, "servant name")?;
        let func_name = required(dec.read_string(6, true)?, "function name")?;
        let buffer = required(dec.read_bytes(7, true)?, "buffer")?;
        let timeout = dec.read_int32(8, false)?.unwrap_or(0);
        let context = read_string_map(&mut dec, 9, false)?;
        let status = read_string_map(&mut dec, 10, false)?;

        Ok(Self {
            version,
            packet_type,
            message_type,
            request_id,
            servant_name,
            func_name,
            buffer,
            timeout,
            context,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::consts::{TARS_NORMAL, TUP_VERSION};

    fn sample_request() -> RequestPacket {
        RequestPacket {
            version: TUP_VERSION,
            packet_type: TARS_NORMAL,
            message_type: 0,
            request_id: 7,
            servant_name: "Obj".to_string(),
            func_name: "call".to_string(),
            buffer: Vec::new(),
            timeout: 2000,
            context: Vec::new(),
            status: Vec::new(),
        }
    }

    /// Тест проверяет round-trip кадра запроса: все поля
    /// восстанавливаются из закодированного кадра.
    #[test]
    fn test_request_frame_roundtrip() {
        let original = sample_request();
        let frame = original.encode().unwrap();

        // Префикс длины покрывает весь кадр, включая самого себя.
        let announced = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
        assert_eq!(announced as usize, frame.len());

        let decoded = RequestPacket::decode(&frame).unwrap();
        assert_eq!(decoded, original);
    }

    /// Тест проверяет round-trip запроса со словарями и нагрузкой.
    #[test]
    fn test_request_with_context_and_payload() {
        let mut original = sample_request();
        original.buffer = vec![0x0A, 0x0B, 0x0C];
        original.context = vec![("trace".to_string(), "abc123".to_string())];
        original.status = vec![("node".to_string(), "n1".to_string())];

        let frame = original.encode().unwrap();
        let decoded = RequestPacket::decode(&frame).unwrap();
        assert_eq!(decoded, original);
    }

    /// Тест проверяет отказ на кадре с неверной заявленной длиной.
    #[test]
    fn test_bad_frame_length() {
        let mut frame = sample_request().encode().unwrap();
        frame[3] = frame[3].wrapping_add(1);
        let err = RequestPacket::decode(&frame).unwrap_err();
        assert!(matches!(err, PacketError::BadFrame(_)));
    }

    /// Тест проверяет отказ на кадре короче префикса длины.
    #[test]
    fn test_frame_shorter_than_prefix() {
        let err = RequestPacket::decode(&[0x00, 0x00]).unwrap_err();
        assert!(matches!(err, PacketError::BadFrame(_)));
    }
}
