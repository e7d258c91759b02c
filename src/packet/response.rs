// Copyright 2025 Tarsio

//! Конверт RPC-ответа.
//!
//! У ответа две раскладки полей, выбираемые по версии протокола,
//! прочитанной из тега 1 до интерпретации остальных тегов: смысл
//! тега, а не только его номер, зависит от версии.

use super::{
    consts::{STATUS_RESULT_CODE, STATUS_RESULT_DESC, TUP_VERSION},
    read_string_map, required, strip_frame, write_string_map,
};
use crate::{
    codec::{TarsDecoder, TarsEncoder},
    error::PacketError,
};

/// Пакет ответа.
///
/// Версия 3: раскладка повторяет запрос (теги 3–10), код и описание
/// результата folded в `context` под зарезервированными ключами.
/// Остальные версии: код результата — выделенное поле под тегом 5,
/// описание — под тегом 8, `context` (тег 9) может отсутствовать
/// целиком.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePacket {
    pub version: i16,
    pub packet_type: i8,
    pub request_id: i32,
    pub message_type: i32,
    pub ret: i32,
    pub buffer: Vec<u8>,
    pub status: Vec<(String, String)>,
    pub result_desc: String,
    pub context: Vec<(String, String)>,
    // Поля, присутствующие только в раскладке версии 3.
    pub servant_name: String,
    pub func_name: String,
    pub timeout: i32,
}

impl ResponsePacket {
    /// Кодирует пакет в полный кадр с префиксом длины.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        if self.version == TUP_VERSION {
            self.encode_tup()
        } else {
            self.encode_classic()
        }
    }

    /// Декодирует полный кадр; раскладка выбирается по версии из
    /// тега 1.
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let body = strip_frame(data)?;
        let mut dec = TarsDecoder::new(body);

        let version = required(dec.read_int16(1, true)?, "version")?;
        let packet_type = required(dec.read_int8(2, true)?, "packet type")?;

        if version == TUP_VERSION {
            Self::decode_tup(&mut dec, version, packet_type)
        } else {
            Self::decode_classic(&mut dec, version, packet_type)
        }
    }

    fn encode_tup(&self) -> Result<Vec<u8>, PacketError> {
        let mut enc = TarsEncoder::with_length_header();
        enc.write_int16(1, self.version)?;
        enc.write_int8(2, self.packet_type)?;
        enc.write_int32(3, self.message_type)?;
        enc.write_int32(4, self.request_id)?;
        enc.write_string(5, &self.servant_name)?;
        enc.write_string(6, &self.func_name)?;
        enc.write_bytes(7, &self.buffer)?;
        enc.write_int32(8, self.timeout)?;

        // Код и описание результата уезжают в context под
        // зарезервированными ключами.
        let mut context: Vec<(String, String)> = self
            .context
            .iter()
            .filter(|(k, _)| k != STATUS_RESULT_CODE && k != STATUS_RESULT_DESC)
            .cloned()
            .collect();
        context.push((STATUS_RESULT_CODE.to_string(), self.ret.to_string()));
        if !self.result_desc.is_empty() {
            context.push((STATUS_RESULT_DESC.to_string(), self.result_desc.clone()));
        }
        write_string_map(&mut enc, 9, &context)?;
        write_string_map(&mut enc, 10, &self.status)?;
        Ok(enc.into_bytes())
    }

    fn encode_classic(&self) -> Result<Vec<u8>, PacketError> {
        let mut enc = TarsEncoder::with_length_header();
        enc.write_int16(1, self.version)?;
        enc.write_int8(2, self.packet_type)?;
        enc.write_int32(3, self.request_id)?;
        enc.write_int32(4, self.message_type)?;
        enc.write_int32(5, self.ret)?;
        enc.write_bytes(6, &self.buffer)?;
        write_string_map(&mut enc, 7, &self.status)?;
        enc.write_string(8, &self.result_desc)?;
        if !self.context.is_empty() {
            write_string_map(&mut enc, 9, &self.context)?;
        }
        Ok(enc.into_bytes())
    }

    fn decode_tup(
        dec: &mut TarsDecoder<'_>,
        version: i16,
        packet_type: i8,
    ) -> Result<Self, PacketError> {
        let message_type = required(dec.read_int32(3, true)?, "message type")?;
        let request_id = required(dec.read_int32(4, true)?, "request id")?;
        let servant_name = required(dec.read_string(5, true)?, "servant name")?;
        let func_name = required(dec.read_string(6, true)?, "function name")?;
        let buffer = required(dec.read_bytes(7, true)?, "buffer")?;
        let timeout = dec.read_int32(8, false)?.unwrap_or(0);
        let mut context = read_string_map(dec, 9, false)?;
        let status = read_string_map(dec, 10, false)?;

        let mut ret_raw = None;
        let mut result_desc = String::new();
        context.retain(|(key, value)| {
            if key == STATUS_RESULT_CODE {
                ret_raw = Some(value.clone());
                false
            } else if key == STATUS_RESULT_DESC {
                result_desc = value.clone();
                false
            } else {
                true
            }
        });
        let ret = match ret_raw {
            Some(raw) => raw.parse().map_err(|_| {
                PacketError::BadFrame(format!("result code `{raw}` is not an integer"))
            })?,
            None => 0,
        };

        Ok(Self {
            version,
            packet_type,
            request_id,
            message_type,
            ret,
            buffer,
            status,
            result_desc,
            context,
            servant_name,
            func_name,
            timeout,
        })
    }

    fn decode_classic(
        dec: &mut TarsDecoder<'_>,
        version: i16,
        packet_type: i8,
    ) -> Result<Self, PacketError> {
        let request_id = required(dec.read_int32(3, true)?, "request id")?;
        let message_type = required(dec.read_int32(4, true)?, "message type")?;
        let ret = required(dec.read_int32(5, true)?, "result code")?;
        let buffer = required(dec.read_bytes(6, true)?, "buffer")?;
        let status = read_string_map(dec, 7, false)?;
        let result_desc = dec.read_string(8, false)?.unwrap_or_default();
        let context = read_string_map(dec, 9, false)?;

        Ok(Self {
            version,
            packet_type,
            request_id,
            message_type,
            ret,
            buffer,
            status,
            result_desc,
            context,
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::consts::{TARS_NORMAL, TARS_SERVER_SUCCESS, TARS_VERSION};

    /// Тест проверяет round-trip классической раскладки: код и
    /// описание результата — выделенные поля.
    #[test]
    fn test_classic_roundtrip() {
        let original = ResponsePacket {
            version: TARS_VERSION,
            packet_type: TARS_NORMAL,
            request_id: 42,
            message_type: 0,
            ret: TARS_SERVER_SUCCESS,
            buffer: vec![1, 2, 3],
            status: vec![("s".to_string(), "v".to_string())],
            result_desc: "ok".to_string(),
            context: Vec::new(),
            ..ResponsePacket::default()
        };

        let frame = original.encode().unwrap();
        let decoded = ResponsePacket::decode(&frame).unwrap();
        assert_eq!(decoded, original);
    }

    /// Тест проверяет, что в классической раскладке context может
    /// отсутствовать на проводе целиком.
    #[test]
    fn test_classic_context_absent() {
        let original = ResponsePacket {
            version: TARS_VERSION,
            ret: -1,
            result_desc: "decode failed".to_string(),
            ..ResponsePacket::default()
        };

        let frame = original.encode().unwrap();
        let decoded = ResponsePacket::decode(&frame).unwrap();
        assert!(decoded.context.is_empty());
        assert_eq!(decoded.ret, -1);
        assert_eq!(decoded.result_desc, "decode failed");
    }

    /// Тест проверяет round-trip раскладки версии 3: код результата
    /// восстанавливается из зарезервированного ключа context.
    #[test]
    fn test_tup_roundtrip() {
        let original = ResponsePacket {
            version: TUP_VERSION,
            packet_type: TARS_NORMAL,
            request_id: 9,
            message_type: 0,
            ret: -99,
            buffer: vec![0xFF],
            status: Vec::new(),
            result_desc: "unknown error".to_string(),
            context: vec![("trace".to_string(), "t1".to_string())],
            servant_name: "Obj".to_string(),
            func_name: "call".to_string(),
            timeout: 1000,
        };

        let frame = original.encode().unwrap();
        let decoded = ResponsePacket::decode(&frame).unwrap();
        assert_eq!(decoded, original);
    }

    /// Тест проверяет отказ на нечисловом коде результата в
    /// зарезервированном ключе.
    #[test]
    fn test_tup_garbage_result_code() {
        let original = ResponsePacket {
            version: TUP_VERSION,
            context: vec![(STATUS_RESULT_CODE.to_string(), "not a number".to_string())],
            ..ResponsePacket::default()
        };

        // encode перезаписывает зарезервированный ключ корректным
        // значением, поэтому кадр собираем вручную из чистого пакета,
        // а ключ подделываем на лету.
        let mut tampered = original.clone();
        tampered.context.clear();
        let frame = tampered.encode().unwrap();
        let mut bytes = frame.clone();
        // Кадр честный, ломаем значение ключа: "0" -> "x".
        let needle = STATUS_RESULT_CODE.as_bytes();
        let pos = bytes
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap();
        // Значение идёт следом: заголовок строки + длина 1 + байт.
        let value_byte = pos + needle.len() + 2;
        bytes[value_byte] = b'x';

        let err = ResponsePacket::decode(&bytes).unwrap_err();
        assert!(matches!(err, PacketError::BadFrame(_)));
    }
}
