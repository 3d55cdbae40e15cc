/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use url::Url;

use super::CacheEntry;

pub trait CacheStore: Send + Sync {
    fn lookup(&self, url: &Url) -> Option<Arc<CacheEntry>>;

    fn store(&self, entry: CacheEntry);

    fn delete(&self, url: &Url) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Least recently used entries are dropped first.
pub struct MemoryCacheStore {
    inner: Mutex<LruCache<String, Arc<CacheEntry>>>,
}

impl MemoryCacheStore {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        MemoryCacheStore {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }
}

impl CacheStore for MemoryCacheStore {
    fn lookup(&self, url: &Url) -> Option<Arc<CacheEntry>> {
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&cache_key(url)).cloned()
    }

    fn store(&self, entry: CacheEntry) {
        let key = cache_key(&entry.url);
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(key, Arc::new(entry));
    }

    fn delete(&self, url: &Url) -> bool {
        let mut cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.pop(&cache_key(url)).is_some()
    }

    fn len(&self) -> usize {
        let cache = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::Utc;
    use http::StatusCode;
    use swarm_http::header::ResponseHeader;

    fn entry(url: &str) -> CacheEntry {
        CacheEntry::new(
            Url::parse(url).unwrap(),
            StatusCode::OK,
            "HTTP/1.1 200 OK".to_string(),
            ResponseHeader::default(),
            Bytes::from_static(b"test"),
            Utc::now(),
        )
    }

    #[test]
    fn lookup() {
        let store = MemoryCacheStore::new(2);
        store.store(entry("http://a.example/1#top"));
        let url = Url::parse("http://a.example/1").unwrap();
        assert_eq!(store.lookup(&url).unwrap().size(), 4);
        assert!(store.delete(&url));
        assert!(!store.delete(&url));
        assert!(store.is_empty());
    }

    #[test]
    fn evict() {
        let store = MemoryCacheStore::new(2);
        store.store(entry("http://a.example/1"));
        store.store(entry("http://a.example/2"));
        store.store(entry("http://a.example/3"));
        assert_eq!(store.len(), 2);
        assert!(
            store
                .lookup(&Url::parse("http://a.example/1").unwrap())
                .is_none()
        );
    }
}
