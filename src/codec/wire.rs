// Copyright 2025 Tarsio

//! Типы данных проводного формата Tars.
//!
//! Каждое поле на проводе начинается с заголовка: старший ниббл —
//! тег поля, младший — четырёхбитный код типа. Этот модуль определяет
//! перечисление `WireType` и арифметику заголовка.

use std::fmt;

use crate::error::DecodeError;

/// Максимальный тег, помещающийся в ниббл заголовка.
pub const MAX_INLINE_TAG: u8 = 14;
/// Значение ниббла, сигнализирующее о расширенном теге (второй байт).
pub const TAG_EXTENSION: u8 = 15;

/// Четырёхбитный код типа, стоящий за заголовком поля.
///
/// `Zero` — нулевое по длине представление числового нуля любого
/// целого или дробного типа. `SimpleList` — упакованный вектор байтов
/// без индивидуальных заголовков элементов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    Int64 = 3,
    Float = 4,
    Double = 5,
    String1 = 6,
    String4 = 7,
    Map = 8,
    Vector = 9,
    StructBegin = 10,
    StructEnd = 11,
    Zero = 12,
    SimpleList = 13,
}

impl WireType {
    /// Разбирает младший ниббл заголовка в `WireType`.
    pub fn from_u4(code: u8) -> Result<Self, DecodeError> {
        Ok(match code {
            0 => WireType::Int8,
            1 => WireType::Int16,
            2 => WireType::Int32,
            3 => WireType::Int64,
            4 => WireType::Float,
            5 => WireType::Double,
            6 => WireType::String1,
            7 => WireType::String4,
            8 => WireType::Map,
            9 => WireType::Vector,
            10 => WireType::StructBegin,
            11 => WireType::StructEnd,
            12 => WireType::Zero,
            13 => WireType::SimpleList,
            other => {
                return Err(DecodeError::TypeNotMatch(format!(
                    "unknown wire type code {other}"
                )))
            }
        })
    }

    pub fn as_u4(self) -> u8 {
        self as u8
    }

    /// Проверяет, принимает ли объявленный тип `self` фактический
    /// тип `actual` с провода.
    ///
    /// Энкодер сжимает числа до минимальной ширины, поэтому декодер
    /// обязан принимать любое более узкое представление: `Int64`
    /// принимает `Int32`/`Int16`/`Int8`/`Zero`, `String4` принимает
    /// `String1`, `Vector` принимает `SimpleList` и т.д.
    pub fn accepts(self, actual: WireType) -> bool {
        use WireType::*;
        if self == actual {
            return true;
        }
        matches!(
            (self, actual),
            (Int8, Zero)
                | (Int16, Int8 | Zero)
                | (Int32, Int16 | Int8 | Zero)
                | (Int64, Int32 | Int16 | Int8 | Zero)
                | (Float, Zero)
                | (Double, Zero)
                | (String4, String1)
                | (Vector, SimpleList)
        )
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Int8 => "int8",
            WireType::Int16 => "int16",
            WireType::Int32 => "int32",
            WireType::Int64 => "int64",
            WireType::Float => "float",
            WireType::Double => "double",
            WireType::String1 => "string1",
            WireType::String4 => "string4",
            WireType::Map => "map",
            WireType::Vector => "vector",
            WireType::StructBegin => "struct-begin",
            WireType::StructEnd => "struct-end",
            WireType::Zero => "zero",
            WireType::SimpleList => "simple-list",
        };
        f.write_str(name)
    }
}
