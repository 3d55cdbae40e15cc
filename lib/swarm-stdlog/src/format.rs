/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::cell::RefCell;
use std::fmt::{Arguments, Write};

use itoa::Integer;
use ryu::Float;
use slog::{Error, KV, OwnedKVList, Record, Serializer};

use super::StdLogValue;

thread_local! {
    static TL_BUF: RefCell<String> = RefCell::new(String::with_capacity(128));
}

pub struct StdLogFormatter {
    append_code_position: bool,
}

impl StdLogFormatter {
    pub(super) fn new(append_code_position: bool) -> Self {
        StdLogFormatter {
            append_code_position,
        }
    }

    pub(super) fn format_slog(
        &self,
        record: &Record,
        logger_values: &OwnedKVList,
    ) -> Result<StdLogValue, Error> {
        let mut kv_pairs = Vec::new();
        let mut kv_formatter = FormatterKv(&mut kv_pairs);

        logger_values.serialize(record, &mut kv_formatter)?;
        record.kv().serialize(record, &mut kv_formatter)?;

        let location = if self.append_code_position {
            let location = match record.file().rsplit_once('/').map(|x| x.1) {
                Some(filename) => format!("{}({filename}:{})", record.module(), record.line()),
                None => record.module().to_string(),
            };
            Some(location)
        } else {
            None
        };

        Ok(StdLogValue {
            level: record.level(),
            message: record.msg().to_string(),
            kv_pairs,
            location,
        })
    }
}

struct FormatterKv<'a>(&'a mut Vec<(String, String)>);

impl FormatterKv<'_> {
    fn emit_integer<T: Integer>(&mut self, key: slog::Key, value: T) -> slog::Result {
        let mut buffer = itoa::Buffer::new();
        let value_s = buffer.format(value);
        self.emit_str(key, value_s)
    }

    fn emit_float<T: Float>(&mut self, key: slog::Key, value: T) -> slog::Result {
        let mut buffer = ryu::Buffer::new();
        let value_s = buffer.format(value);
        self.emit_str(key, value_s)
    }
}

impl Serializer for FormatterKv<'_> {
    impl_integer_by_itoa! {
        /// Emit `usize`
        usize => emit_usize
    }
    impl_integer_by_itoa! {
        /// Emit `isize`
        isize => emit_isize
    }
    impl_integer_by_itoa! {
        /// Emit `u8`
        u8 => emit_u8
    }
    impl_integer_by_itoa! {
        /// Emit `i8`
        i8 => emit_i8
    }
    impl_integer_by_itoa! {
        /// Emit `u16`
        u16 => emit_u16
    }
    impl_integer_by_itoa! {
        /// Emit `i16`
        i16 => emit_i16
    }
    impl_integer_by_itoa! {
        /// Emit `u32`
        u32 => emit_u32
    }
    impl_integer_by_itoa! {
        /// Emit `i32`
        i32 => emit_i32
    }
    impl_float_by_ryu! {
        /// Emit `f32`
        f32 => emit_f32
    }
    impl_integer_by_itoa! {
        /// Emit `u64`
        u64 => emit_u64
    }
    impl_integer_by_itoa! {
        /// Emit `i64`
        i64 => emit_i64
    }
    impl_float_by_ryu! {
        /// Emit `f64`
        f64 => emit_f64
    }

    fn emit_bool(&mut self, key: slog::Key, value: bool) -> slog::Result {
        if value {
            self.emit_str(key, "true")
        } else {
            self.emit_str(key, "false")
        }
    }

    fn emit_char(&mut self, key: slog::Key, value: char) -> slog::Result {
        self.emit_str(key, value.encode_utf8(&mut [0u8; 4]))
    }

    fn emit_none(&mut self, _key: slog::Key) -> slog::Result {
        Ok(())
    }

    fn emit_str(&mut self, key: slog::Key, value: &str) -> slog::Result {
        self.0.push((key.to_string(), value.to_string()));
        Ok(())
    }

    fn emit_arguments(&mut self, key: slog::Key, value: &Arguments) -> slog::Result {
        if let Some(s) = value.as_str() {
            self.emit_str(key, s)
        } else {
            TL_BUF.with_borrow_mut(|buf| {
                buf.clear();
                buf.write_fmt(*value)?;
                self.emit_str(key, buf.as_str())
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_integer() {
        let mut vars = Vec::new();
        let mut kv_formatter = FormatterKv(&mut vars);

        kv_formatter.emit_u64("total".into(), 1024u64).unwrap();
        kv_formatter.emit_i8("delta".into(), -1i8).unwrap();
        assert_eq!(
            vars,
            [
                ("total".to_string(), "1024".to_string()),
                ("delta".to_string(), "-1".to_string())
            ]
        );
    }

    #[test]
    fn format_f64() {
        let mut vars = Vec::new();
        let mut kv_formatter = FormatterKv(&mut vars);

        kv_formatter.emit_f64("ratio".into(), 0.5f64).unwrap();
        assert_eq!(vars, [("ratio".to_string(), "0.5".to_string())]);
    }

    #[test]
    fn format_argument() {
        let mut vars = Vec::new();
        let mut kv_formatter = FormatterKv(&mut vars);

        let v = "value";
        kv_formatter
            .emit_arguments("a-key".into(), &format_args!("a-{v}"))
            .unwrap();
        kv_formatter.emit_none("empty".into()).unwrap();
        assert_eq!(vars, [("a-key".to_string(), "a-value".to_string())]);
    }
}
