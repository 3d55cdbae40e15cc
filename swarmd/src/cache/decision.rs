/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::path::Component;

use chrono::{DateTime, Utc};
use http::{Method, StatusCode};
use url::Url;

use swarm_http::date::HttpDateOrRaw;
use swarm_http::header::ResponseHeader;

use super::{CacheEntry, CachePathResolver, CachePolicy, ReloadClass};

const CGI_EXTENSIONS: &[&str] = &["cgi", "pl", "php", "asp", "aspx", "jsp", "py"];

const STORABLE_STATUS: &[StatusCode] = &[
    StatusCode::OK,
    StatusCode::NON_AUTHORITATIVE_INFORMATION,
    StatusCode::MULTIPLE_CHOICES,
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::GONE,
];

#[cfg(windows)]
const MAX_PATH_LEN: usize = 260;
#[cfg(not(windows))]
const MAX_PATH_LEN: usize = 4096;
const MAX_NAME_LEN: usize = 255;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreDenyReason {
    Disabled,
    UncacheableStatus(u16),
    PostMethod,
    CgiUrl,
    AmbiguousPath,
    PathTooLong,
    NoStore,
    Private,
    MimeExcluded(String),
    TooLarge(u64),
    Incomplete,
}

impl fmt::Display for StoreDenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreDenyReason::Disabled => f.write_str("cache disabled"),
            StoreDenyReason::UncacheableStatus(code) => write!(f, "status {code} not cacheable"),
            StoreDenyReason::PostMethod => f.write_str("post request"),
            StoreDenyReason::CgiUrl => f.write_str("dynamic url"),
            StoreDenyReason::AmbiguousPath => f.write_str("ambiguous cache path"),
            StoreDenyReason::PathTooLong => f.write_str("cache path too long"),
            StoreDenyReason::NoStore => f.write_str("no-store"),
            StoreDenyReason::Private => f.write_str("private"),
            StoreDenyReason::MimeExcluded(mime) => write!(f, "mime type {mime} excluded"),
            StoreDenyReason::TooLarge(limit) => write!(f, "larger than {limit} bytes"),
            StoreDenyReason::Incomplete => f.write_str("incomplete body"),
        }
    }
}

/// Whether the url carries parameters or points to a script.
pub fn is_cgi_url(url: &Url) -> bool {
    if url.query().is_some() {
        return true;
    }
    let path = url.path().to_ascii_lowercase();
    if path.contains("cgi-bin") {
        return true;
    }
    let name = path.rsplit('/').next().unwrap_or_default();
    match name.rsplit_once('.') {
        Some((_, ext)) => CGI_EXTENSIONS.contains(&ext),
        None => false,
    }
}

pub fn shall_use_cache(
    method: &Method,
    url: &Url,
    entry: Option<&CacheEntry>,
    policy: &dyn CachePolicy,
    now: DateTime<Utc>,
) -> bool {
    if method == Method::POST || is_cgi_url(url) {
        return false;
    }
    match entry {
        Some(entry) => policy.is_fresh(entry, now),
        None => false,
    }
}

pub fn shall_store_cache(
    status: StatusCode,
    header: &ResponseHeader,
    url: &Url,
    method: &Method,
    resolver: &dyn CachePathResolver,
    policy: &dyn CachePolicy,
) -> Option<StoreDenyReason> {
    if !STORABLE_STATUS.contains(&status) {
        return Some(StoreDenyReason::UncacheableStatus(status.as_u16()));
    }
    if method == Method::POST {
        return Some(StoreDenyReason::PostMethod);
    }
    if is_cgi_url(url) {
        return Some(StoreDenyReason::CgiUrl);
    }

    let path = resolver.resolve(url);
    if path.as_os_str().len() > MAX_PATH_LEN
        || path.components().any(|c| match c {
            Component::Normal(s) => s.len() > MAX_NAME_LEN,
            _ => false,
        })
    {
        return Some(StoreDenyReason::PathTooLong);
    }
    if resolver.is_ambiguous(&path) {
        return Some(StoreDenyReason::AmbiguousPath);
    }

    policy.store_denied(url, header)
}

/// Classify a reload by comparing the new body size with the prior entry.
pub fn classify_reload(stored: bool, prior: Option<&CacheEntry>, new_size: u64) -> ReloadClass {
    match (stored, prior) {
        (true, None) => ReloadClass::Fill,
        (true, Some(p)) if p.size() == new_size => ReloadClass::StaleReloadBad,
        (true, Some(_)) => ReloadClass::StaleReloadGood,
        (false, None) => ReloadClass::Passing,
        (false, Some(_)) => ReloadClass::NoReload,
    }
}

/// The header of a 304 answer, if the client copy is still current.
pub fn not_modified_header(
    entry: &CacheEntry,
    if_modified_since: Option<&HttpDateOrRaw>,
    now: DateTime<Utc>,
) -> Option<ResponseHeader> {
    let ims = if_modified_since?.date()?;
    if *ims < entry.last_modified() {
        return None;
    }
    let mut header = entry.header.clone();
    header.set_date(&now);
    if header.header().content_length() < 0 {
        header.header_mut().set_content_length(entry.size());
    }
    Some(header)
}
