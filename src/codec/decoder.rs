// Copyright 2025 Tarsio

//! Входной поток Tars.
//!
//! `TarsDecoder` читает тегированные поля из байтового буфера,
//! сопоставляя запрошенный тег и тип с фактически присутствующими.
//! Здесь же живёт вся терпимость к эволюции схемы: прозрачное
//! расширение сжатых чисел, пропуск неизвестных полей и возврат
//! «отсутствует» для опциональных полей, которых нет на проводе.

use std::{cmp::Ordering, io::Cursor};

use bytes::Buf;
use tracing::error;

use super::{
    types::{FieldType, StructDescriptor, StructMap, StructValue, Value},
    wire::{WireType, TAG_EXTENSION},
};
use crate::error::DecodeError;

/// Токен без схемы: тег, фактический тип с провода и значение.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tag: u8,
    pub wire: WireType,
    pub value: TokenValue,
}

/// Значение токена при обходе потока без дескрипторов.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Int(i64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    List(Vec<Token>),
    Map(Vec<(Token, Token)>),
    Fields(Vec<Token>),
    SimpleList(Vec<u8>),
}

/// Однопроходный декодер поверх неизменяемого среза байтов.
///
/// Возврат на один заголовок назад реализован запоминанием позиции
/// курсора перед чтением заголовка, без общего seek-примитива.
pub struct TarsDecoder<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> TarsDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(data),
        }
    }

    pub fn has_remaining(&self) -> bool {
        self.cur.has_remaining()
    }

    pub fn remaining(&self) -> usize {
        self.cur.remaining()
    }

    // --- Низкоуровневые чтения с проверкой остатка ---

    fn need(&self, n: usize) -> Result<(), DecodeError> {
        let remaining = self.cur.remaining();
        if remaining < n {
            let err = DecodeError::LengthNotMatch {
                requested: n,
                remaining,
            };
            error!("{err}");
            return Err(err);
        }
        Ok(())
    }

    fn take_u8(&mut self) -> Result<u8, DecodeError> {
        self.need(1)?;
        Ok(self.cur.get_u8())
    }

    fn take_i16(&mut self) -> Result<i16, DecodeError> {
        self.need(2)?;
        Ok(self.cur.get_i16())
    }

    fn take_i32(&mut self) -> Result<i32, DecodeError> {
        self.need(4)?;
        Ok(self.cur.get_i32())
    }

    fn take_i64(&mut self) -> Result<i64, DecodeError> {
        self.need(8)?;
        Ok(self.cur.get_i64())
    }

    fn take_u32(&mut self) -> Result<u32, DecodeError> {
        self.need(4)?;
        Ok(self.cur.get_u32())
    }

    fn take_f32(&mut self) -> Result<f32, DecodeError> {
        self.need(4)?;
        Ok(self.cur.get_f32())
    }

    fn take_f64(&mut self) -> Result<f64, DecodeError> {
        self.need(8)?;
        Ok(self.cur.get_f64())
    }

    fn take_bytes(&mut self, n: usize) -> Result<Vec<u8>, DecodeError> {
        self.need(n)?;
        let mut out = vec![0; n];
        self.cur.copy_to_slice(&mut out);
        Ok(out)
    }

    fn skip_bytes(&mut self, n: usize) -> Result<(), DecodeError> {
        self.need(n)?;
        self.cur.advance(n);
        Ok(())
    }

    /// Читает заголовок поля: один байт, либо два при расширенном
    /// теге.
    fn read_header(&mut self) -> Result<(u8, WireType), DecodeError> {
        let head = self.take_u8()?;
        let wire = WireType::from_u4(head & 0x0F)?;
        let nibble = head >> 4;
        let tag = if nibble == TAG_EXTENSION {
            self.take_u8()?
        } else {
            nibble
        };
        Ok((tag, wire))
    }

    // --- Движок совместимости ---

    /// Читает один заголовок, требуя ровно ожидаемый тег.
    pub fn match_tag(&mut self, expected_tag: u8) -> Result<WireType, DecodeError> {
        if !self.cur.has_remaining() {
            return Err(self.fail_tag(expected_tag, "stream exhausted"));
        }
        let (tag, wire) = self.read_header()?;
        if tag != expected_tag {
            return Err(self.fail_tag(expected_tag, &format!("found tag {tag}")));
        }
        Ok(wire)
    }

    /// Сопоставляет запрошенный тег/тип с содержимым потока.
    ///
    /// Возвращает фактический тип с провода, либо `None`, когда
    /// опциональное поле отсутствует (конец структуры или больший
    /// тег). Поля с меньшими тегами, не нужные вызывающему,
    /// пропускаются целиком по их собственным правилам.
    pub fn match_field(
        &mut self,
        expected_tag: u8,
        expected: WireType,
        required: bool,
    ) -> Result<Option<WireType>, DecodeError> {
        loop {
            if !self.cur.has_remaining() {
                if required {
                    return Err(self.fail_tag(expected_tag, "stream exhausted"));
                }
                return Ok(None);
            }

            let start = self.cur.position();
            let (tag, wire) = self.read_header()?;

            if wire == WireType::StructEnd {
                // Конец структуры: оставшиеся поля отсутствуют.
                if required {
                    return Err(self.fail_tag(expected_tag, "struct ended early"));
                }
                self.cur.set_position(start);
                return Ok(None);
            }

            match tag.cmp(&expected_tag) {
                Ordering::Equal => {
                    if !expected.accepts(wire) {
                        let err = DecodeError::TypeNotMatch(format!(
                            "tag {tag}: declared {expected}, wire has {wire}"
                        ));
                        error!("{err}");
                        return Err(err);
                    }
                    return Ok(Some(wire));
                }
                Ordering::Greater => {
                    // Искомое поле отсутствует на проводе.
                    if required {
                        return Err(
                            self.fail_tag(expected_tag, &format!("next tag is {tag}"))
                        );
                    }
                    self.cur.set_position(start);
                    return Ok(None);
                }
                Ordering::Less => {
                    // Неизвестное вызывающему поле — пропускаем и
                    // пробуем дальше.
                    self.skip_field(wire)?;
                }
            }
        }
    }

    fn match_required(&mut self, tag: u8, expected: WireType) -> Result<WireType, DecodeError> {
        match self.match_field(tag, expected, true)? {
            Some(wire) => Ok(wire),
            None => Err(self.fail_tag(tag, "required field absent")),
        }
    }

    fn fail_tag(&self, tag: u8, detail: &str) -> DecodeError {
        let err = DecodeError::TagNotMatch(format!(
            "tag {tag} at position {}: {detail}",
            self.cur.position()
        ));
        error!("{err}");
        err
    }

    // --- Пропуск полей ---

    /// Структурно проходит значение данного типа, ничего не
    /// материализуя.
    pub fn skip_field(&mut self, wire: WireType) -> Result<(), DecodeError> {
        match wire {
            WireType::Zero | WireType::StructEnd => Ok(()),
            WireType::Int8 => self.skip_bytes(1),
            WireType::Int16 => self.skip_bytes(2),
            WireType::Int32 | WireType::Float => self.skip_bytes(4),
            WireType::Int64 | WireType::Double => self.skip_bytes(8),
            WireType::String1 => {
                let len = self.take_u8()? as usize;
                self.skip_bytes(len)
            }
            WireType::String4 => {
                let len = self.take_u32()? as usize;
                self.skip_bytes(len)
            }
            WireType::Map => {
                let count = self.read_length()?;
                for _ in 0..count {
                    let (_, key_wire) = self.read_header()?;
                    self.skip_field(key_wire)?;
                    let (_, value_wire) = self.read_header()?;
                    self.skip_field(value_wire)?;
                }
                Ok(())
            }
            WireType::Vector => {
                let count = self.read_length()?;
                for _ in 0..count {
                    let (_, elem_wire) = self.read_header()?;
                    self.skip_field(elem_wire)?;
                }
                Ok(())
            }
            WireType::StructBegin => self.skip_to_struct_end(),
            WireType::SimpleList => {
                let len = self.read_simple_list_length()?;
                self.skip_bytes(len)
            }
        }
    }

    /// Пропускает поля до терминатора структуры включительно.
    ///
    /// Сюда же попадают поля с тегами выше всех объявленных — данные
    /// более новой схемы, которые эта сторона ещё не знает.
    fn skip_to_struct_end(&mut self) -> Result<(), DecodeError> {
        loop {
            if !self.cur.has_remaining() {
                return Err(self.fail_tag(0, "struct terminator missing"));
            }
            let (_, wire) = self.read_header()?;
            if wire == WireType::StructEnd {
                return Ok(());
            }
            self.skip_field(wire)?;
        }
    }

    // --- Полезные нагрузки ---

    /// Читает целую полезную нагрузку фактической ширины и расширяет
    /// до i64 (обратная сторона сжатия при записи).
    fn read_int_payload(&mut self, wire: WireType) -> Result<i64, DecodeError> {
        match wire {
            WireType::Zero => Ok(0),
            WireType::Int8 => Ok(self.take_u8()? as i8 as i64),
            WireType::Int16 => Ok(self.take_i16()? as i64),
            WireType::Int32 => Ok(self.take_i32()? as i64),
            WireType::Int64 => self.take_i64(),
            other => {
                let err =
                    DecodeError::TypeNotMatch(format!("expected integer payload, got {other}"));
                error!("{err}");
                Err(err)
            }
        }
    }

    /// Счётчик элементов контейнера — тегированное int32-поле под
    /// тегом 0 сразу за заголовком контейнера.
    fn read_length(&mut self) -> Result<usize, DecodeError> {
        let wire = self.match_required(0, WireType::Int32)?;
        let count = self.read_int_payload(wire)?;
        let count = usize::try_from(count).map_err(|_| {
            let err = DecodeError::OutOfRange(format!("negative container length {count}"));
            error!("{err}");
            err
        })?;
        // Каждому элементу нужен хотя бы один байт заголовка.
        if count > self.cur.remaining() {
            let err = DecodeError::LengthNotMatch {
                requested: count,
                remaining: self.cur.remaining(),
            };
            error!("{err}");
            return Err(err);
        }
        Ok(count)
    }

    /// Полезная нагрузка `SimpleList`: вложенный маркер `(0, int8)`,
    /// затем тегированная длина.
    fn read_simple_list_length(&mut self) -> Result<usize, DecodeError> {
        let (_, marker) = self.read_header()?;
        if marker != WireType::Int8 {
            let err = DecodeError::TypeNotMatch(format!(
                "simple-list element marker must be int8, got {marker}"
            ));
            error!("{err}");
            return Err(err);
        }
        self.read_length()
    }

    fn read_string_payload(&mut self, wire: WireType) -> Result<String, DecodeError> {
        let len = match wire {
            WireType::String1 => self.take_u8()? as usize,
            WireType::String4 => self.take_u32()? as usize,
            other => {
                let err =
                    DecodeError::TypeNotMatch(format!("expected string payload, got {other}"));
                error!("{err}");
                return Err(err);
            }
        };
        Ok(String::from_utf8(self.take_bytes(len)?)?)
    }

    // --- Типизированные читатели ---

    pub fn read_int64(&mut self, tag: u8, required: bool) -> Result<Option<i64>, DecodeError> {
        match self.match_field(tag, WireType::Int64, required)? {
            Some(wire) => Ok(Some(self.read_int_payload(wire)?)),
            None => Ok(None),
        }
    }

    pub fn read_int32(&mut self, tag: u8, required: bool) -> Result<Option<i32>, DecodeError> {
        match self.match_field(tag, WireType::Int32, required)? {
            Some(wire) => {
                let v = self.read_int_payload(wire)?;
                Ok(Some(self.narrow(v, "int32")?))
            }
            None => Ok(None),
        }
    }

    pub fn read_int16(&mut self, tag: u8, required: bool) -> Result<Option<i16>, DecodeError> {
        match self.match_field(tag, WireType::Int16, required)? {
            Some(wire) => {
                let v = self.read_int_payload(wire)?;
                Ok(Some(self.narrow(v, "int16")?))
            }
            None => Ok(None),
        }
    }

    pub fn read_int8(&mut self, tag: u8, required: bool) -> Result<Option<i8>, DecodeError> {
        match self.match_field(tag, WireType::Int8, required)? {
            Some(wire) => {
                let v = self.read_int_payload(wire)?;
                Ok(Some(self.narrow(v, "int8")?))
            }
            None => Ok(None),
        }
    }

    // Беззнаковые: объявленный тип читается из следующей знаковой
    // ширины, затем сужается с контролем диапазона.
    pub fn read_uint8(&mut self, tag: u8, required: bool) -> Result<Option<u8>, DecodeError> {
        match self.match_field(tag, WireType::Int16, required)? {
            Some(wire) => {
                let v = self.read_int_payload(wire)?;
                Ok(Some(self.narrow(v, "uint8")?))
            }
            None => Ok(None),
        }
    }

    pub fn read_uint16(&mut self, tag: u8, required: bool) -> Result<Option<u16>, DecodeError> {
        match self.match_field(tag, WireType::Int32, required)? {
            Some(wire) => {
                let v = self.read_int_payload(wire)?;
                Ok(Some(self.narrow(v, "uint16")?))
            }
            None => Ok(None),
        }
    }

    pub fn read_uint32(&mut self, tag: u8, required: bool) -> Result<Option<u32>, DecodeError> {
        match self.match_field(tag, WireType::Int64, required)? {
            Some(wire) => {
                let v = self.read_int_payload(wire)?;
                Ok(Some(self.narrow(v, "uint32")?))
            }
            None => Ok(None),
        }
    }

    /// Битовое представление i64 трактуется как u64.
    pub fn read_uint64(&mut self, tag: u8, required: bool) -> Result<Option<u64>, DecodeError> {
        Ok(self.read_int64(tag, required)?.map(|v| v as u64))
    }

    pub fn read_bool(&mut self, tag: u8, required: bool) -> Result<Option<bool>, DecodeError> {
        Ok(self.read_int8(tag, required)?.map(|v| v != 0))
    }

    pub fn read_char(&mut self, tag: u8, required: bool) -> Result<Option<u8>, DecodeError> {
        Ok(self.read_int8(tag, required)?.map(|v| v as u8))
    }

    pub fn read_float(&mut self, tag: u8, required: bool) -> Result<Option<f32>, DecodeError> {
        match self.match_field(tag, WireType::Float, required)? {
            Some(WireType::Zero) => Ok(Some(0.0)),
            Some(_) => Ok(Some(self.take_f32()?)),
            None => Ok(None),
        }
    }

    pub fn read_double(&mut self, tag: u8, required: bool) -> Result<Option<f64>, DecodeError> {
        match self.match_field(tag, WireType::Double, required)? {
            Some(WireType::Zero) => Ok(Some(0.0)),
            Some(_) => Ok(Some(self.take_f64()?)),
            None => Ok(None),
        }
    }

    pub fn read_string(&mut self, tag: u8, required: bool) -> Result<Option<String>, DecodeError> {
        match self.match_field(tag, WireType::String4, required)? {
            Some(wire) => Ok(Some(self.read_string_payload(wire)?)),
            None => Ok(None),
        }
    }

    /// Вектор байтов: упакованный `SimpleList`, либо обобщённый
    /// `Vector` поэлементных int8 — обе формы дают одну и ту же
    /// последовательность байтов.
    pub fn read_bytes(&mut self, tag: u8, required: bool) -> Result<Option<Vec<u8>>, DecodeError> {
        match self.match_field(tag, WireType::Vector, required)? {
            Some(WireType::SimpleList) => {
                let len = self.read_simple_list_length()?;
                Ok(Some(self.take_bytes(len)?))
            }
            Some(_) => {
                let count = self.read_length()?;
                let mut out = Vec::with_capacity(count);
                for _ in 0..count {
                    let wire = self.match_required(0, WireType::Int8)?;
                    out.push(self.read_int_payload(wire)? as u8);
                }
                Ok(Some(out))
            }
            None => Ok(None),
        }
    }

    pub fn read_vector(
        &mut self,
        tag: u8,
        required: bool,
        elem: &FieldType,
    ) -> Result<Option<Value>, DecodeError> {
        if elem.is_byte() {
            return Ok(self.read_bytes(tag, required)?.map(Value::Bytes));
        }
        match self.match_field(tag, WireType::Vector, required)? {
            Some(WireType::SimpleList) => {
                let len = self.read_simple_list_length()?;
                Ok(Some(Value::Bytes(self.take_bytes(len)?)))
            }
            Some(_) => {
                let count = self.read_length()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    match self.read(0, elem, true)? {
                        Some(v) => items.push(v),
                        None => return Err(self.fail_tag(0, "vector element absent")),
                    }
                }
                Ok(Some(Value::List(items)))
            }
            None => Ok(None),
        }
    }

    /// Пары накапливаются в `StructMap` в порядке следования на
    /// проводе; для словаря это и есть порядок вставки отправителя.
    pub fn read_map(
        &mut self,
        tag: u8,
        required: bool,
        key_ty: &FieldType,
        value_ty: &FieldType,
    ) -> Result<Option<StructMap>, DecodeError> {
        match self.match_field(tag, WireType::Map, required)? {
            Some(_) => {
                let count = self.read_length()?;
                let mut map = StructMap::new();
                for _ in 0..count {
                    let key = match self.read(0, key_ty, true)? {
                        Some(k) => k,
                        None => return Err(self.fail_tag(0, "map key absent")),
                    };
                    let value = match self.read(1, value_ty, true)? {
                        Some(v) => v,
                        None => return Err(self.fail_tag(1, "map value absent")),
                    };
                    map.insert(key, value);
                }
                Ok(Some(map))
            }
            None => Ok(None),
        }
    }

    /// Читает структуру по дескриптору: объявленные поля по
    /// возрастанию тега, затем терминатор. Поля новее дескриптора
    /// поглощаются при выходе к терминатору.
    pub fn read_struct(
        &mut self,
        tag: u8,
        required: bool,
        desc: &StructDescriptor,
    ) -> Result<Option<StructValue>, DecodeError> {
        match self.match_field(tag, WireType::StructBegin, required)? {
            Some(_) => {
                let mut sv = StructValue::new(desc.name.clone());
                for field in &desc.fields {
                    if let Some(v) = self.read(field.tag, &field.ty, field.required)? {
                        sv.set(field.tag, v);
                    }
                }
                self.skip_to_struct_end()?;
                Ok(Some(sv))
            }
            None => Ok(None),
        }
    }

    /// Полиморфное чтение значения по объявленному логическому типу —
    /// обратная сторона `TarsEncoder::write`.
    pub fn read(
        &mut self,
        tag: u8,
        ty: &FieldType,
        required: bool,
    ) -> Result<Option<Value>, DecodeError> {
        Ok(match ty {
            FieldType::Bool => self.read_bool(tag, required)?.map(Value::Bool),
            FieldType::Int8 => self.read_int8(tag, required)?.map(|v| Value::Int(v as i64)),
            FieldType::UInt8 => self
                .read_uint8(tag, required)?
                .map(|v| Value::Int(v as i64)),
            FieldType::Int16 => self
                .read_int16(tag, required)?
                .map(|v| Value::Int(v as i64)),
            FieldType::UInt16 => self
                .read_uint16(tag, required)?
                .map(|v| Value::Int(v as i64)),
            FieldType::Int32 => self
                .read_int32(tag, required)?
                .map(|v| Value::Int(v as i64)),
            FieldType::UInt32 => self
                .read_uint32(tag, required)?
                .map(|v| Value::Int(v as i64)),
            FieldType::Int64 => self.read_int64(tag, required)?.map(Value::Int),
            FieldType::UInt64 => self
                .read_uint64(tag, required)?
                .map(|v| Value::Int(v as i64)),
            FieldType::Float => self.read_float(tag, required)?.map(Value::Float),
            FieldType::Double => self.read_double(tag, required)?.map(Value::Double),
            FieldType::String => self.read_string(tag, required)?.map(Value::String),
            // Ординал принимается без сверки со списком членов:
            // новые члены отправителя не ломают декодирование.
            FieldType::Enum(_) => self.read_int64(tag, required)?.map(Value::Int),
            FieldType::Struct(desc) => self.read_struct(tag, required, desc)?.map(Value::Struct),
            FieldType::Vector(elem) => self.read_vector(tag, required, elem)?,
            FieldType::Map(kt, vt) => self.read_map(tag, required, kt, vt)?.map(Value::Map),
        })
    }

    fn narrow<T: TryFrom<i64>>(&self, value: i64, ty: &str) -> Result<T, DecodeError> {
        T::try_from(value).map_err(|_| {
            let err = DecodeError::OutOfRange(format!("value {value} out of range for {ty}"));
            error!("{err}");
            err
        })
    }

    // --- Обход без схемы ---

    /// Проходит весь поток без дескрипторов, выдавая дерево токенов
    /// `(тег, тип, значение)` — для инспекции полезных нагрузок с
    /// неизвестной схемой.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, DecodeError> {
        let mut tokens = Vec::new();
        while self.cur.has_remaining() {
            tokens.push(self.read_token()?);
        }
        Ok(tokens)
    }

    fn read_token(&mut self) -> Result<Token, DecodeError> {
        let (tag, wire) = self.read_header()?;
        let value = self.read_token_value(wire)?;
        Ok(Token { tag, wire, value })
    }

    fn read_token_value(&mut self, wire: WireType) -> Result<TokenValue, DecodeError> {
        Ok(match wire {
            WireType::Zero => TokenValue::Int(0),
            WireType::Int8 | WireType::Int16 | WireType::Int32 | WireType::Int64 => {
                TokenValue::Int(self.read_int_payload(wire)?)
            }
            WireType::Float => TokenValue::Float(self.take_f32()?),
            WireType::Double => TokenValue::Double(self.take_f64()?),
            WireType::String1 => {
                let len = self.take_u8()? as usize;
                TokenValue::Bytes(self.take_bytes(len)?)
            }
            WireType::String4 => {
                let len = self.take_u32()? as usize;
                TokenValue::Bytes(self.take_bytes(len)?)
            }
            WireType::Map => {
                let count = self.read_length()?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let key = self.read_token()?;
                    let value = self.read_token()?;
                    entries.push((key, value));
                }
                TokenValue::Map(entries)
            }
            WireType::Vector => {
                let count = self.read_length()?;
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_token()?);
                }
                TokenValue::List(items)
            }
            WireType::StructBegin => {
                let mut fields = Vec::new();
                loop {
                    if !self.cur.has_remaining() {
                        return Err(self.fail_tag(0, "struct terminator missing"));
                    }
                    let start = self.cur.position();
                    let (_, next) = self.read_header()?;
                    if next == WireType::StructEnd {
                        break;
                    }
                    self.cur.set_position(start);
                    fields.push(self.read_token()?);
                }
                TokenValue::Fields(fields)
            }
            WireType::StructEnd => {
                let err =
                    DecodeError::TypeNotMatch("unexpected struct terminator in token walk".into());
                error!("{err}");
                return Err(err);
            }
            WireType::SimpleList => {
                let len = self.read_simple_list_length()?;
                TokenValue::SimpleList(self.take_bytes(len)?)
            }
        })
    }
}
