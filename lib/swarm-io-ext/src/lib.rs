/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod count;
mod ext;
mod limited_write;

pub use count::{AccountBytes, ByteAccounting, ByteAccountingSnapshot, CountingReader, CountingWriter};
pub use ext::{LimitedBufReadExt, LimitedReadUntil};
pub use limited_write::{SizeLimitExceeded, SizeLimitedWriter};
