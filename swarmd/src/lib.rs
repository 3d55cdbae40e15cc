/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod log;
pub mod opts;
pub mod pool;
pub mod resolve;
pub mod serve;
pub mod stat;
pub mod upstream;
