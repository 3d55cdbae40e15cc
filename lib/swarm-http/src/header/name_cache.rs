/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Arc, Mutex, PoisonError};

use ahash::AHashMap;
use arcstr::ArcStr;

/// Map lower-cased header names to the casing first seen on a connection.
///
/// Clones share the same table.
#[derive(Clone, Debug, Default)]
pub struct HeaderNameCache {
    inner: Arc<Mutex<AHashMap<String, ArcStr>>>,
}

impl HeaderNameCache {
    pub fn canonical(&self, lower: &str, name: &str) -> ArcStr {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(v) = map.get(lower) {
            return v.clone();
        }
        let v = ArcStr::from(name);
        map.insert(lower.to_string(), v.clone());
        v
    }

    pub fn len(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
