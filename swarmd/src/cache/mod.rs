/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::{Method, StatusCode};
use url::Url;

use swarm_http::header::ResponseHeader;

use crate::config::CacheConfig;

mod decision;
pub use decision::{
    StoreDenyReason, classify_reload, is_cgi_url, not_modified_header, shall_store_cache,
    shall_use_cache,
};

mod entry;
pub use entry::{CacheEntry, ReloadClass};

mod path;
pub use path::{CachePathResolver, FsCachePathResolver};

mod policy;
pub use policy::{CachePolicy, DefaultCachePolicy};

mod store;
pub use store::{CacheStore, MemoryCacheStore};

/// The cache collaborators used by the forward proxy.
pub struct ProxyCache {
    enabled: bool,
    max_object_size: u64,
    store: Arc<dyn CacheStore>,
    policy: Arc<dyn CachePolicy>,
    resolver: Arc<dyn CachePathResolver>,
}

impl ProxyCache {
    pub fn new(config: &CacheConfig) -> Self {
        ProxyCache {
            enabled: config.enabled,
            max_object_size: config.max_object_size,
            store: Arc::new(MemoryCacheStore::new(config.max_entries)),
            policy: Arc::new(DefaultCachePolicy::new(&config.excluded_mime_types)),
            resolver: Arc::new(FsCachePathResolver::new(&config.directory)),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn CachePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn CachePathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn max_object_size(&self) -> u64 {
        self.max_object_size
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Any entry stored for the url, fresh or not.
    pub fn prior(&self, url: &Url) -> Option<Arc<CacheEntry>> {
        if !self.enabled {
            return None;
        }
        self.store.lookup(url)
    }

    /// The entry to answer the request with, if the cache may be used.
    pub fn usable(
        &self,
        method: &Method,
        url: &Url,
        prior: Option<&Arc<CacheEntry>>,
        now: DateTime<Utc>,
    ) -> Option<Arc<CacheEntry>> {
        let entry = prior?;
        if shall_use_cache(method, url, Some(entry), self.policy.as_ref(), now) {
            Some(Arc::clone(entry))
        } else {
            None
        }
    }

    pub fn store_decision(
        &self,
        method: &Method,
        url: &Url,
        status: StatusCode,
        header: &ResponseHeader,
    ) -> Option<StoreDenyReason> {
        if !self.enabled {
            return Some(StoreDenyReason::Disabled);
        }
        shall_store_cache(
            status,
            header,
            url,
            method,
            self.resolver.as_ref(),
            self.policy.as_ref(),
        )
    }

    /// Store the entry if there is one, then classify the reload.
    pub fn finish(
        &self,
        entry: Option<CacheEntry>,
        prior: Option<&CacheEntry>,
        new_size: u64,
    ) -> ReloadClass {
        match entry {
            Some(mut entry) => {
                let class = classify_reload(true, prior, new_size);
                entry.reload = class;
                self.store.store(entry);
                class
            }
            None => classify_reload(false, prior, new_size),
        }
    }
}
