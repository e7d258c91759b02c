//! Модуль `codec` реализует бинарный потоковый формат Tars.
//!
//! Он включает в себя:
//! - Субмодуль `wire` – четырёхбитные коды типов провода и арифметика
//!   заголовка поля.
//! - Субмодуль `types` – дескрипторы логических типов и динамическое
//!   дерево значений.
//! - Субмодуль `encoder` – выходной поток с минимизацией ширины чисел.
//! - Субмодуль `decoder` – входной поток с терпимостью к эволюции
//!   схемы и токенизатором для потоков без схемы.
//!
//! Из этого модуля переэкспортируются ключевые типы кодека:
//! - `WireType`, `FieldType`, `StructDescriptor`, `FieldDescriptor`,
//!   `EnumDescriptor`, `Value`, `StructValue`, `StructMap`.
//! - `TarsEncoder` и `TarsDecoder` – для кодирования и декодирования.
//! - `Token` и `TokenValue` – для обхода потока без дескрипторов.

pub mod decoder;
pub mod encoder;
pub mod types;
pub mod wire;

// Publicly re-export the codec surface to simplify access from
// external code.
pub use decoder::{TarsDecoder, Token, TokenValue};
pub use encoder::TarsEncoder;
pub use types::{
    EnumDescriptor, FieldDescriptor, FieldType, StructDescriptor, StructMap, StructValue, Value,
};
pub use wire::{WireType, MAX_INLINE_TAG, TAG_EXTENSION};
