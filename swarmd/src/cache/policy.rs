/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use swarm_http::header::ResponseHeader;

use super::{CacheEntry, StoreDenyReason};

const DEFAULT_EXCLUDED_MIME_TYPES: &[&str] = &[
    "audio/",
    "video/",
    "application/ogg",
    "application/vnd.rn-realmedia",
    "application/x-mpegurl",
    "application/vnd.apple.mpegurl",
    "application/x-shockwave-flash",
];

/// Freshness and store eligibility of responses.
pub trait CachePolicy: Send + Sync {
    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool;

    fn store_denied(&self, url: &Url, header: &ResponseHeader) -> Option<StoreDenyReason>;
}

pub struct DefaultCachePolicy {
    excluded_mime_types: Vec<String>,
}

impl Default for DefaultCachePolicy {
    fn default() -> Self {
        DefaultCachePolicy::new(&[])
    }
}

impl DefaultCachePolicy {
    /// Mime type prefixes, the builtin streaming media list is used if empty.
    pub fn new(excluded_mime_types: &[String]) -> Self {
        let excluded_mime_types = if excluded_mime_types.is_empty() {
            DEFAULT_EXCLUDED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            excluded_mime_types.to_vec()
        };
        DefaultCachePolicy {
            excluded_mime_types,
        }
    }

    fn lifetime(&self, entry: &CacheEntry) -> Option<Duration> {
        let header = &entry.header;
        if let Some(max_age) = header.max_age() {
            return Some(max_age);
        }
        let date = header.date().unwrap_or(entry.stored_at);
        if let Some(expires) = header.expires() {
            return Some((expires - date).to_std().unwrap_or_default());
        }
        let last_modified = header.last_modified()?;
        (date - last_modified).to_std().ok().map(|age| age / 10)
    }
}

impl CachePolicy for DefaultCachePolicy {
    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        if entry.header.has_cache_directive("no-cache")
            || entry.header.has_cache_directive("no-store")
        {
            return false;
        }
        let Some(lifetime) = self.lifetime(entry) else {
            return false;
        };
        let age = (now - entry.stored_at).to_std().unwrap_or_default();
        age < lifetime
    }

    fn store_denied(&self, _url: &Url, header: &ResponseHeader) -> Option<StoreDenyReason> {
        if header.has_cache_directive("no-store") {
            return Some(StoreDenyReason::NoStore);
        }
        if header.has_cache_directive("private") {
            return Some(StoreDenyReason::Private);
        }
        let mime = header.header().mime_type()?;
        if self
            .excluded_mime_types
            .iter()
            .any(|prefix| mime.starts_with(prefix.as_str()))
        {
            return Some(StoreDenyReason::MimeExcluded(mime));
        }
        None
    }
}
