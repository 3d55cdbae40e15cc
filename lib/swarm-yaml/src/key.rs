/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

/// Config keys are case-insensitive and '-' is the same as '_'.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}
