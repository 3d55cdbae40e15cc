/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::StatusCode;
use url::Url;

use swarm_http::header::ResponseHeader;

/// How a proxied response relates to what the cache held before.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReloadClass {
    /// Stored, nothing was cached before.
    Fill,
    /// Stored over an entry of a different size.
    StaleReloadGood,
    /// Stored over an entry of the same size, the reload was likely wasted.
    StaleReloadBad,
    /// Not stored, nothing was cached before.
    Passing,
    /// Not stored, the prior entry is kept.
    NoReload,
}

impl ReloadClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReloadClass::Fill => "FILL",
            ReloadClass::StaleReloadGood => "STALE_RELOAD_GOOD",
            ReloadClass::StaleReloadBad => "STALE_RELOAD_BAD",
            ReloadClass::Passing => "PASSING",
            ReloadClass::NoReload => "NO_RELOAD",
        }
    }
}

impl fmt::Display for ReloadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub url: Url,
    pub status: StatusCode,
    pub status_line: String,
    pub header: ResponseHeader,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
    pub reload: ReloadClass,
}

impl CacheEntry {
    pub fn new(
        url: Url,
        status: StatusCode,
        status_line: String,
        header: ResponseHeader,
        body: Bytes,
        stored_at: DateTime<Utc>,
    ) -> Self {
        CacheEntry {
            url,
            status,
            status_line,
            header,
            body,
            stored_at,
            reload: ReloadClass::Fill,
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    /// Last-Modified, or Date, or the store time.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.header
            .last_modified()
            .or_else(|| self.header.date())
            .unwrap_or(self.stored_at)
    }
}
