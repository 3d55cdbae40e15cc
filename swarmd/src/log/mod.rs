/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

pub mod process;
pub(crate) mod task;

const LOG_TYPE_TASK: &str = "Task";
