/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

mod limited_buf_read_ext;
mod limited_read_until;

pub use limited_buf_read_ext::LimitedBufReadExt;
pub use limited_read_until::LimitedReadUntil;
