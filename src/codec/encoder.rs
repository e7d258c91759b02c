// Copyright 2025 Tarsio

//! Выходной поток Tars.
//!
//! `TarsEncoder` последовательно пишет тегированные поля в растущий
//! байтовый буфер, выбирая для чисел минимально достаточную ширину
//! представления. Опционально буфер начинается с четырёхбайтового
//! big-endian префикса полной длины, заполняемого при финализации.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use super::{
    types::{FieldType, StructDescriptor, StructValue, Value},
    wire::{WireType, MAX_INLINE_TAG, TAG_EXTENSION},
};
use crate::error::EncodeError;

/// Однопроходный энкодер: один экземпляр обслуживает ровно одну
/// операцию кодирования.
pub struct TarsEncoder {
    buf: Vec<u8>,
    length_header: bool,
}

impl TarsEncoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            length_header: false,
        }
    }

    /// Резервирует четыре байта под префикс полной длины кадра;
    /// значение вписывается в `into_bytes`.
    pub fn with_length_header() -> Self {
        Self {
            buf: vec![0; 4],
            length_header: true,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Завершает кодирование и отдаёт буфер. Длина кадра включает
    /// сам префикс.
    pub fn into_bytes(mut self) -> Vec<u8> {
        if self.length_header {
            let total = self.buf.len() as u32;
            self.buf[..4].copy_from_slice(&total.to_be_bytes());
        }
        self.buf
    }

    /// Пишет заголовок поля: `(tag << 4) | wire`, с байтом расширения
    /// для тегов больше 14.
    pub fn write_header(&mut self, tag: u8, wire: WireType) {
        if tag <= MAX_INLINE_TAG {
            self.buf.push((tag << 4) | wire.as_u4());
        } else {
            self.buf.push((TAG_EXTENSION << 4) | wire.as_u4());
            self.buf.push(tag);
        }
    }

    // --- Числовые поля ---

    /// Пишет целое, сжимая к минимальной ширине: ноль кодируется
    /// пустым `Zero`, дальше перебор `int8` → `int16` → `int32` →
    /// `int64` по диапазону значения.
    pub fn write_int64(&mut self, tag: u8, value: i64) -> Result<(), EncodeError> {
        if value == 0 {
            self.write_header(tag, WireType::Zero);
        } else if (i8::MIN as i64..=i8::MAX as i64).contains(&value) {
            self.write_header(tag, WireType::Int8);
            self.buf.write_i8(value as i8)?;
        } else if (i16::MIN as i64..=i16::MAX as i64).contains(&value) {
            self.write_header(tag, WireType::Int16);
            self.buf.write_i16::<BigEndian>(value as i16)?;
        } else if (i32::MIN as i64..=i32::MAX as i64).contains(&value) {
            self.write_header(tag, WireType::Int32);
            self.buf.write_i32::<BigEndian>(value as i32)?;
        } else {
            self.write_header(tag, WireType::Int64);
            self.buf.write_i64::<BigEndian>(value)?;
        }
        Ok(())
    }

    pub fn write_int32(&mut self, tag: u8, value: i32) -> Result<(), EncodeError> {
        self.write_int64(tag, value as i64)
    }

    pub fn write_int16(&mut self, tag: u8, value: i16) -> Result<(), EncodeError> {
        self.write_int64(tag, value as i64)
    }

    pub fn write_int8(&mut self, tag: u8, value: i8) -> Result<(), EncodeError> {
        self.write_int64(tag, value as i64)
    }

    // Беззнаковые значения расширяются в следующую знаковую ширину;
    // сжатие по значению дальше общее.
    pub fn write_uint8(&mut self, tag: u8, value: u8) -> Result<(), EncodeError> {
        self.write_int64(tag, value as i64)
    }

    pub fn write_uint16(&mut self, tag: u8, value: u16) -> Result<(), EncodeError> {
        self.write_int64(tag, value as i64)
    }

    pub fn write_uint32(&mut self, tag: u8, value: u32) -> Result<(), EncodeError> {
        self.write_int64(tag, value as i64)
    }

    /// 64-битное беззнаковое пишется как его битовое представление
    /// в `i64`; декодер восстанавливает паттерн без потерь.
    pub fn write_uint64(&mut self, tag: u8, value: u64) -> Result<(), EncodeError> {
        self.write_int64(tag, value as i64)
    }

    pub fn write_bool(&mut self, tag: u8, value: bool) -> Result<(), EncodeError> {
        self.write_int8(tag, i8::from(value))
    }

    pub fn write_char(&mut self, tag: u8, value: u8) -> Result<(), EncodeError> {
        self.write_int8(tag, value as i8)
    }

    /// Ноль с плавающей точкой определяется через epsilon, не строгое
    /// равенство: крошечные субнормальные значения кодируются как
    /// точный ноль и не восстановимы. Известная потеря, зафиксирована
    /// форматом.
    pub fn write_float(&mut self, tag: u8, value: f32) -> Result<(), EncodeError> {
        if value < f32::EPSILON && value > -f32::EPSILON {
            self.write_header(tag, WireType::Zero);
        } else {
            self.write_header(tag, WireType::Float);
            self.buf.write_f32::<BigEndian>(value)?;
        }
        Ok(())
    }

    pub fn write_double(&mut self, tag: u8, value: f64) -> Result<(), EncodeError> {
        if value < f64::EPSILON && value > -f64::EPSILON {
            self.write_header(tag, WireType::Zero);
        } else {
            self.write_header(tag, WireType::Double);
            self.buf.write_f64::<BigEndian>(value)?;
        }
        Ok(())
    }

    // --- Строки и контейнеры ---

    /// До 255 байт — `String1` с однобайтовой длиной, дальше
    /// `String4` с четырёхбайтовой big-endian длиной.
    pub fn write_string(&mut self, tag: u8, value: &str) -> Result<(), EncodeError> {
        let bytes = value.as_bytes();
        if bytes.len() <= u8::MAX as usize {
            self.write_header(tag, WireType::String1);
            self.buf.write_u8(bytes.len() as u8)?;
        } else {
            self.write_header(tag, WireType::String4);
            self.buf.write_u32::<BigEndian>(bytes.len() as u32)?;
        }
        self.buf.write_all(bytes)?;
        Ok(())
    }

    /// Вектор байтов — упакованный `SimpleList`: вложенный маркер
    /// `(0, int8)`, тегированная длина, сырые байты. Экономит один
    /// заголовок на каждый элемент.
    pub fn write_bytes(&mut self, tag: u8, data: &[u8]) -> Result<(), EncodeError> {
        self.write_header(tag, WireType::SimpleList);
        self.write_header(0, WireType::Int8);
        self.write_int32(0, data.len() as i32)?;
        self.buf.write_all(data)?;
        Ok(())
    }

    /// Поля пишутся по возрастанию тега; отсутствующее опциональное
    /// поле опускается целиком, отсутствующее обязательное — ошибка.
    pub fn write_struct(
        &mut self,
        tag: u8,
        value: &StructValue,
        desc: &StructDescriptor,
    ) -> Result<(), EncodeError> {
        self.write_header(tag, WireType::StructBegin);
        for field in &desc.fields {
            match value.get(field.tag) {
                Some(v) => self.write(field.tag, v, &field.ty)?,
                None if field.required => {
                    return Err(EncodeError::MissingRequired(format!(
                        "{}.{} (tag {})",
                        desc.name, field.name, field.tag
                    )));
                }
                None => {}
            }
        }
        self.write_header(0, WireType::StructEnd);
        Ok(())
    }

    pub fn write_vector(
        &mut self,
        tag: u8,
        items: &[Value],
        elem: &FieldType,
    ) -> Result<(), EncodeError> {
        self.write_header(tag, WireType::Vector);
        self.write_int32(0, items.len() as i32)?;
        if elem.is_byte() {
            // Байтовый элемент на проводе — всегда int8, независимо
            // от знаковости объявленного типа.
            for item in items {
                let v = item.as_int().ok_or_else(|| {
                    EncodeError::TypeMismatch(format!("byte vector element {item:?}"))
                })?;
                if !(i8::MIN as i64..=u8::MAX as i64).contains(&v) {
                    return Err(Self::range_mismatch("byte", v));
                }
                self.write_int8(0, v as u8 as i8)?;
            }
        } else {
            for item in items {
                self.write(0, item, elem)?;
            }
        }
        Ok(())
    }

    /// Пары пишутся в порядке итерации контейнера: ключ под тегом 0,
    /// значение под тегом 1.
    pub fn write_map(
        &mut self,
        tag: u8,
        map: &super::types::StructMap,
        key_ty: &FieldType,
        value_ty: &FieldType,
    ) -> Result<(), EncodeError> {
        self.write_header(tag, WireType::Map);
        self.write_int32(0, map.len() as i32)?;
        for (k, v) in map.iter() {
            self.write(0, k, key_ty)?;
            self.write(1, v, value_ty)?;
        }
        Ok(())
    }

    /// Полиморфная запись значения по объявленному логическому типу.
    ///
    /// Несовпадение значения и типа — ошибка программиста, она
    /// всплывает сразу и никогда не приводится молча.
    pub fn write(&mut self, tag: u8, value: &Value, ty: &FieldType) -> Result<(), EncodeError> {
        match (ty, value) {
            (FieldType::Bool, Value::Bool(b)) => self.write_bool(tag, *b),
            (FieldType::Int8, Value::Int(i)) => {
                let v = i8::try_from(*i).map_err(|_| Self::range_mismatch("int8", *i))?;
                self.write_int8(tag, v)
            }
            (FieldType::UInt8, Value::Int(i)) => {
                let v = u8::try_from(*i).map_err(|_| Self::range_mismatch("uint8", *i))?;
                self.write_uint8(tag, v)
            }
            (FieldType::Int16, Value::Int(i)) => {
                let v = i16::try_from(*i).map_err(|_| Self::range_mismatch("int16", *i))?;
                self.write_int16(tag, v)
            }
            (FieldType::UInt16, Value::Int(i)) => {
                let v = u16::try_from(*i).map_err(|_| Self::range_mismatch("uint16", *i))?;
                self.write_uint16(tag, v)
            }
            (FieldType::Int32, Value::Int(i)) => {
                let v = i32::try_from(*i).map_err(|_| Self::range_mismatch("int32", *i))?;
                self.write_int32(tag, v)
            }
            (FieldType::UInt32, Value::Int(i)) => {
                let v = u32::try_from(*i).map_err(|_| Self::range_mismatch("uint32", *i))?;
                self.write_uint32(tag, v)
            }
            (FieldType::Int64, Value::Int(i)) => self.write_int64(tag, *i),
            (FieldType::UInt64, Value::Int(i)) => self.write_uint64(tag, *i as u64),
            (FieldType::Float, Value::Float(f)) => self.write_float(tag, *f),
            (FieldType::Double, Value::Double(d)) => self.write_double(tag, *d),
            (FieldType::String, Value::String(s)) => self.write_string(tag, s),
            // Перечисление — это его 64-битный ординал.
            (FieldType::Enum(_), Value::Int(i)) => self.write_int64(tag, *i),
            (FieldType::Enum(desc), Value::String(member)) => {
                let ordinal = desc.ordinal_of(member).ok_or_else(|| {
                    EncodeError::TypeMismatch(format!(
                        "unknown member `{member}` of enum {}",
                        desc.name
                    ))
                })?;
                self.write_int64(tag, ordinal)
            }
            (FieldType::Struct(desc), Value::Struct(sv)) => self.write_struct(tag, sv, desc),
            (FieldType::Vector(elem), Value::Bytes(data)) if elem.is_byte() => {
                self.write_bytes(tag, data)
            }
            (FieldType::Vector(elem), Value::List(items)) => self.write_vector(tag, items, elem),
            (FieldType::Map(kt, vt), Value::Map(m)) => self.write_map(tag, m, kt, vt),
            (ty, value) => Err(EncodeError::TypeMismatch(format!(
                "value {value:?} does not fit declared type {ty:?}"
            ))),
        }
    }

    fn range_mismatch(ty: &str, value: i64) -> EncodeError {
        EncodeError::TypeMismatch(format!("value {value} out of range for declared {ty}"))
    }
}

impl Default for TarsEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::types::FieldDescriptor;

    /// Тест проверяет сжатие целых: ноль — пустой `Zero`, малые
    /// значения — один байт `int8`, далее по диапазону.
    #[test]
    fn test_integer_compaction() {
        let mut enc = TarsEncoder::new();
        enc.write_int32(1, 0).unwrap();
        enc.write_int32(2, 5).unwrap();
        enc.write_int32(3, 300).unwrap();
        enc.write_int32(4, 70_000).unwrap();
        let bytes = enc.into_bytes();

        assert_eq!(
            bytes,
            vec![
                0x1C, // (1, zero)
                0x20, 0x05, // (2, int8) 5
                0x31, 0x01, 0x2C, // (3, int16) 300
                0x42, 0x00, 0x01, 0x11, 0x70, // (4, int32) 70000
            ]
        );
    }

    /// Тест проверяет падение через границы i64: большое значение
    /// остаётся восьмибайтовым.
    #[test]
    fn test_int64_full_width() {
        let mut enc = TarsEncoder::new();
        enc.write_int64(0, i64::MAX).unwrap();
        let bytes = enc.into_bytes();
        assert_eq!(bytes[0], 0x03); // (0, int64)
        assert_eq!(&bytes[1..], &i64::MAX.to_be_bytes());
    }

    /// Тест проверяет отрицательные границы: i8::MIN — один байт,
    /// i8::MIN - 1 — уже int16.
    #[test]
    fn test_negative_boundaries() {
        let mut enc = TarsEncoder::new();
        enc.write_int64(0, i8::MIN as i64).unwrap();
        enc.write_int64(1, i8::MIN as i64 - 1).unwrap();
        let bytes = enc.into_bytes();
        assert_eq!(bytes[0], 0x00); // (0, int8)
        assert_eq!(bytes[1] as i8, i8::MIN);
        assert_eq!(bytes[2], 0x11); // (1, int16)
        assert_eq!(&bytes[3..5], &(i8::MIN as i16 - 1).to_be_bytes());
    }

    /// Тест проверяет расширенный тег: тег 15 и выше занимает два
    /// байта заголовка.
    #[test]
    fn test_extended_tag_header() {
        let mut enc = TarsEncoder::new();
        enc.write_int32(200, 1).unwrap();
        let bytes = enc.into_bytes();
        assert_eq!(bytes[0], 0xF0); // (15, int8) — ниббл-сентинел
        assert_eq!(bytes[1], 200); // полный тег
        assert_eq!(bytes[2], 1);
    }

    /// Тест проверяет короткую и длинную формы строки.
    #[test]
    fn test_string_forms() {
        let mut enc = TarsEncoder::new();
        enc.write_string(1, "ok").unwrap();
        let bytes = enc.into_bytes();
        assert_eq!(bytes, vec![0x16, 0x02, b'o', b'k']);

        let long = "x".repeat(256);
        let mut enc = TarsEncoder::new();
        enc.write_string(1, &long).unwrap();
        let bytes = enc.into_bytes();
        assert_eq!(bytes[0], 0x17); // (1, string4)
        assert_eq!(&bytes[1..5], &256u32.to_be_bytes());
        assert_eq!(bytes.len(), 5 + 256);
    }

    /// Тест проверяет epsilon-ноль для double: крошечное значение
    /// кодируется как `Zero` без полезной нагрузки.
    #[test]
    fn test_double_epsilon_zero() {
        let mut enc = TarsEncoder::new();
        enc.write_double(1, 0.0).unwrap();
        enc.write_double(2, f64::EPSILON / 2.0).unwrap();
        enc.write_double(3, 1.5).unwrap();
        let bytes = enc.into_bytes();
        assert_eq!(bytes[0], 0x1C); // (1, zero)
        assert_eq!(bytes[1], 0x2C); // (2, zero) — потеря по epsilon
        assert_eq!(bytes[2], 0x35); // (3, double)
        assert_eq!(&bytes[3..11], &1.5f64.to_be_bytes());
    }

    /// Тест проверяет упакованный вектор байтов: маркер, длина,
    /// сырые данные.
    #[test]
    fn test_simple_list_layout() {
        let mut enc = TarsEncoder::new();
        enc.write_bytes(7, &[0xDE, 0xAD]).unwrap();
        let bytes = enc.into_bytes();
        assert_eq!(
            bytes,
            vec![
                0x7D, // (7, simple-list)
                0x00, // (0, int8) — маркер типа элемента
                0x00, 0x02, // (0, int8) длина 2
                0xDE, 0xAD,
            ]
        );
    }

    /// Тест проверяет префикс длины кадра: четыре байта big-endian,
    /// длина включает сам префикс.
    #[test]
    fn test_length_header_patched() {
        let mut enc = TarsEncoder::with_length_header();
        enc.write_int32(1, 7).unwrap();
        let bytes = enc.into_bytes();
        assert_eq!(bytes.len(), 6);
        assert_eq!(&bytes[..4], &6u32.to_be_bytes());
        assert_eq!(&bytes[4..], &[0x10, 0x07]);
    }

    /// Тест проверяет, что отсутствие обязательного поля структуры
    /// всплывает ошибкой, а опциональное просто опускается.
    #[test]
    fn test_struct_required_field_enforced() {
        let desc = StructDescriptor::new(
            "Pair",
            vec![
                FieldDescriptor::new(1, "left", true, FieldType::Int32),
                FieldDescriptor::new(2, "right", false, FieldType::Int32),
            ],
        );

        let mut full = StructValue::new("Pair");
        full.set(1, Value::Int(1));
        let mut enc = TarsEncoder::new();
        enc.write_struct(0, &full, &desc).unwrap();
        let bytes = enc.into_bytes();
        // (0, struct-begin), (1, int8) 1, (0, struct-end)
        assert_eq!(bytes, vec![0x0A, 0x10, 0x01, 0x0B]);

        let empty = StructValue::new("Pair");
        let mut enc = TarsEncoder::new();
        let err = enc.write_struct(0, &empty, &desc).unwrap_err();
        assert!(matches!(err, EncodeError::MissingRequired(_)));
    }

    /// Тест проверяет, что несовпадение значения и объявленного типа
    /// не приводится молча.
    #[test]
    fn test_type_mismatch_is_fatal() {
        let mut enc = TarsEncoder::new();
        let err = enc
            .write(0, &Value::String("oops".into()), &FieldType::Int32)
            .unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch(_)));

        let err = enc
            .write(0, &Value::Int(300), &FieldType::Int8)
            .unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch(_)));
    }
}
