/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use ahash::AHashMap;
use tokio::time::Instant;

struct WindowRecord {
    time_slice_id: u64,
    cur_count: usize,
}

/// Count based fixed window limiter keyed by string.
///
/// All keys share the same window boundaries.
pub struct FixedWindowLimiter {
    base: Instant,
    window_millis: u64,
    max_count: usize,
    records: Mutex<AHashMap<String, WindowRecord>>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_count: usize) -> Self {
        FixedWindowLimiter {
            base: Instant::now(),
            window_millis: (window.as_millis() as u64).max(1),
            max_count,
            records: Mutex::new(AHashMap::new()),
        }
    }

    fn slice_id(&self, now: Instant) -> u64 {
        let millis = now.saturating_duration_since(self.base).as_millis() as u64;
        millis / self.window_millis
    }

    fn delay(&self, now: Instant) -> Duration {
        let millis = now.saturating_duration_since(self.base).as_millis() as u64;
        Duration::from_millis(self.window_millis - millis % self.window_millis)
    }

    /// Account one request, the error is the time left in the current window.
    pub fn check(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let time_slice_id = self.slice_id(now);
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .entry(key.to_string())
            .or_insert_with(|| WindowRecord {
                time_slice_id,
                cur_count: 0,
            });
        if record.time_slice_id != time_slice_id {
            record.time_slice_id = time_slice_id;
            record.cur_count = 0;
        }

        if record.cur_count < self.max_count {
            record.cur_count += 1;
            Ok(())
        } else {
            Err(self.delay(now))
        }
    }

    /// Give back a count taken by `check` in the same window.
    pub fn release(&self, key: &str, now: Instant) {
        let time_slice_id = self.slice_id(now);
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = records.get_mut(key)
            && record.time_slice_id == time_slice_id
        {
            record.cur_count = record.cur_count.saturating_sub(1);
        }
    }

    /// Drop records of past windows.
    pub fn sweep(&self, now: Instant) -> usize {
        let time_slice_id = self.slice_id(now);
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, r| r.time_slice_id == time_slice_id);
        before - records.len()
    }
}
