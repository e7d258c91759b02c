// Copyright 2025 Tarsio

//! Логическая модель типов кодека Tars.
//!
//! Этот модуль определяет дескрипторы типов (`FieldType`,
//! `StructDescriptor`, `EnumDescriptor`), динамическое дерево значений
//! `Value`, а также упорядоченный контейнер `StructMap` для словарей,
//! чей порядок вставки обязан переживать round-trip.

use std::sync::Arc;

/// Логический тип, объявленный для поля внешним дескриптором
/// структуры.
///
/// Числовые типы различаются только на этапе выбора ширины кодирования
/// и допустимых алиасов при декодировании; на проводе знаковость не
/// различима.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float,
    Double,
    String,
    Enum(Arc<EnumDescriptor>),
    Struct(Arc<StructDescriptor>),
    Vector(Box<FieldType>),
    Map(Box<FieldType>, Box<FieldType>),
}

impl FieldType {
    /// Однобайтовый целый тип: вектор таких элементов кодируется
    /// упакованным `SimpleList` без заголовков на каждый элемент.
    pub fn is_byte(&self) -> bool {
        matches!(self, FieldType::Int8 | FieldType::UInt8)
    }

    /// Примитивный (не контейнерный и не структурный) тип.
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            FieldType::Struct(_) | FieldType::Vector(_) | FieldType::Map(..)
        )
    }
}

/// Описание одного поля структуры: тег, имя, обязательность и тип.
///
/// Дескрипторы неизменяемы и разделяются между вызовами
/// кодирования/декодирования через `Arc` на уровне структуры.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub tag: u8,
    pub name: String,
    pub required: bool,
    pub ty: FieldType,
}

impl FieldDescriptor {
    pub fn new(tag: u8, name: impl Into<String>, required: bool, ty: FieldType) -> Self {
        Self {
            tag,
            name: name.into(),
            required,
            ty,
        }
    }
}

/// Описание структуры: имя и поля, упорядоченные по возрастанию тега.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl StructDescriptor {
    /// Создаёт дескриптор, сортируя поля по тегу.
    ///
    /// Инвариант кодека: теги присутствующих полей идут на проводе
    /// строго по возрастанию, поэтому порядок полей фиксируется здесь
    /// один раз.
    pub fn new(name: impl Into<String>, mut fields: Vec<FieldDescriptor>) -> Arc<Self> {
        fields.sort_by_key(|f| f.tag);
        Arc::new(Self {
            name: name.into(),
            fields,
        })
    }

    pub fn field(&self, tag: u8) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.tag == tag)
    }
}

/// Описание перечисления: имя и пары (имя члена, ординал).
///
/// На проводе перечисление — это его 64-битный ординал; декодер
/// сознательно не проверяет, что ординал принадлежит известному члену
/// (новые члены на стороне отправителя не должны ломать декодирование).
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDescriptor {
    pub name: String,
    pub members: Vec<(String, i64)>,
}

impl EnumDescriptor {
    pub fn new(name: impl Into<String>, members: Vec<(&str, i64)>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            members: members
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        })
    }

    pub fn ordinal_of(&self, member: &str) -> Option<i64> {
        self.members
            .iter()
            .find(|(n, _)| n == member)
            .map(|(_, v)| *v)
    }

    pub fn name_of(&self, ordinal: i64) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, v)| *v == ordinal)
            .map(|(n, _)| n.as_str())
    }
}

/// Динамическое дерево значений, подаваемое энкодеру и возвращаемое
/// декодером.
///
/// Все целые ширины нормализуются в `Int(i64)`: энкодер сжимает до
/// минимальной ширины по значению, декодер расширяет обратно, поэтому
/// идентичность round-trip выполняется на уровне `i64`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(StructMap),
    Struct(StructValue),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&StructMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }
}

/// Упорядоченный словарь «ключ → значение».
///
/// Ключи словаря Tars сами могут быть структурами и потому не годятся
/// в хеш-ключи; контейнер хранит пары в порядке вставки и используется
/// для всех декодированных словарей независимо от типа ключа.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructMap {
    entries: Vec<(Value, Value)>,
}

impl StructMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Вставляет пару, заменяя значение существующего равного ключа
    /// на его прежней позиции.
    pub fn insert(&mut self, key: Value, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }
}

impl FromIterator<(Value, Value)> for StructMap {
    fn from_iter<T: IntoIterator<Item = (Value, Value)>>(iter: T) -> Self {
        let mut map = StructMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for StructMap {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Значение структуры: присутствующие поля по тегу, по возрастанию.
///
/// Отсутствующее опциональное поле — это именно отсутствие записи,
/// а не null-маркер: на проводе такое поле не появляется вовсе.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructValue {
    pub name: String,
    fields: Vec<(u8, Value)>,
}

impl StructValue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Устанавливает поле, сохраняя порядок тегов по возрастанию.
    pub fn set(&mut self, tag: u8, value: Value) {
        match self.fields.binary_search_by_key(&tag, |(t, _)| *t) {
            Ok(idx) => self.fields[idx].1 = value,
            Err(idx) => self.fields.insert(idx, (tag, value)),
        }
    }

    pub fn get(&self, tag: u8) -> Option<&Value> {
        self.fields
            .binary_search_by_key(&tag, |(t, _)| *t)
            .ok()
            .map(|idx| &self.fields[idx].1)
    }

    pub fn fields(&self) -> &[(u8, Value)] {
        &self.fields
    }
}
