//! Модуль `packet` реализует кадрирование RPC-пакетов Tars.
//!
//! Он включает в себя:
//! - Субмодуль `consts` – версии протокола, типы пакетов, коды
//!   результата и зарезервированные ключи.
//! - Субмодуль `request` – конверт запроса `RequestPacket`.
//! - Субмодуль `response` – конверт ответа `ResponsePacket` с двумя
//!   раскладками полей, выбираемыми по версии протокола.
//!
//! Кадр — это четырёхбайтовая big-endian полная длина (включая сам
//! префикс), за которой идут Tars-кодированные поля пакета.

pub mod consts;
pub mod request;
pub mod response;

pub use request::RequestPacket;
pub use response::ResponsePacket;

use crate::{
    codec::{TarsDecoder, TarsEncoder, WireType},
    error::{DecodeError, PacketError},
};

/// Снимает префикс длины, сверяя заявленную длину с фактической.
pub(crate) fn strip_frame(data: &[u8]) -> Result<&[u8], PacketError> {
    if data.len() < 4 {
        return Err(PacketError::BadFrame(format!(
            "frame shorter than length prefix: {} bytes",
            data.len()
        )));
    }
    let announced = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    if announced > consts::MAX_PACKAGE_LENGTH {
        return Err(PacketError::BadFrame(format!(
            "announced length {announced} exceeds {} limit",
            consts::MAX_PACKAGE_LENGTH
        )));
    }
    if announced as usize != data.len() {
        return Err(PacketError::BadFrame(format!(
            "announced length {announced}, actual {}",
            data.len()
        )));
    }
    Ok(&data[4..])
}

/// Обязательное поле пакета: `None` после успешного чтения означает
/// испорченный кадр.
pub(crate) fn required<T>(value: Option<T>, what: &str) -> Result<T, PacketError> {
    value.ok_or_else(|| PacketError::BadFrame(format!("missing required field {what}")))
}

/// Пишет строковый словарь пакета: ключ под тегом 0, значение под
/// тегом 1, порядок пар сохраняется.
pub(crate) fn write_string_map(
    enc: &mut TarsEncoder,
    tag: u8,
    entries: &[(String, String)],
) -> Result<(), PacketError> {
    enc.write_header(tag, WireType::Map);
    enc.write_int32(0, entries.len() as i32)?;
    for (key, value) in entries {
        enc.write_string(0, key)?;
        enc.write_string(1, value)?;
    }
    Ok(())
}

/// Читает строковый словарь пакета; отсутствующий словарь — пустой.
pub(crate) fn read_string_map(
    dec: &mut TarsDecoder<'_>,
    tag: u8,
    required_field: bool,
) -> Result<Vec<(String, String)>, PacketError> {
    let map = match dec.match_field(tag, WireType::Map, required_field)? {
        Some(_) => {
            let count = read_map_count(dec)?;
            let mut out = Vec::with_capacity(count);
            for _ in 0..count {
                let key = required(dec.read_string(0, true)?, "map key")?;
                let value = required(dec.read_string(1, true)?, "map value")?;
                out.push((key, value));
            }
            out
        }
        None => Vec::new(),
    };
    Ok(map)
}

fn read_map_count(dec: &mut TarsDecoder<'_>) -> Result<usize, PacketError> {
    let count = required(dec.read_int32(0, true)?, "map count")?;
    usize::try_from(count)
        .map_err(|_| DecodeError::OutOfRange(format!("negative map count {count}")).into())
}
