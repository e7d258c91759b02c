// Copyright 2025 Tarsio

//! Константы протокола Tars, используемые при упаковке кадров.

/// Версия протокола с выделенными полями результата.
pub const TARS_VERSION: i16 = 1;
/// Версия протокола, складывающая код и описание результата в
/// словарь `context` под зарезервированными ключами.
pub const TUP_VERSION: i16 = 3;

/// Обычный вызов с ответом.
pub const TARS_NORMAL: i8 = 0;
/// Односторонний вызов без ответа.
pub const TARS_ONEWAY: i8 = 1;

/// Коды результата сервера.
pub const TARS_SERVER_SUCCESS: i32 = 0;
pub const TARS_SERVER_DECODE_ERR: i32 = -1;
pub const TARS_SERVER_QUEUE_TIMEOUT: i32 = -2;
pub const TARS_INVOKE_TIMEOUT: i32 = -3;
pub const TARS_SERVER_UNKNOWN_ERR: i32 = -99;

/// Зарезервированный ключ `context` с кодом результата (версия 3).
pub const STATUS_RESULT_CODE: &str = "STATUS_RESULT_CODE";
/// Зарезервированный ключ `context` с описанием результата (версия 3).
pub const STATUS_RESULT_DESC: &str = "STATUS_RESULT_DESC";

/// Предельная длина кадра (100 MB).
pub const MAX_PACKAGE_LENGTH: u32 = 100 * 1024 * 1024;
