/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::path::{Path, PathBuf};

use url::Url;

/// Map urls to cache file paths.
pub trait CachePathResolver: Send + Sync {
    fn resolve(&self, url: &Url) -> PathBuf;

    /// Whether the path clashes with an existing file or directory.
    fn is_ambiguous(&self, path: &Path) -> bool;
}

pub struct FsCachePathResolver {
    root: PathBuf,
}

impl FsCachePathResolver {
    pub fn new(root: &Path) -> Self {
        FsCachePathResolver {
            root: root.to_path_buf(),
        }
    }
}

impl CachePathResolver for FsCachePathResolver {
    fn resolve(&self, url: &Url) -> PathBuf {
        let mut path = self.root.join(url.scheme());
        let host = url
            .host_str()
            .unwrap_or("localhost")
            .trim_matches(['[', ']'])
            .replace(':', "_");
        match url.port() {
            Some(port) => path.push(format!("{host}_{port}")),
            None => path.push(host),
        }

        let mut last_empty = true;
        if let Some(segments) = url.path_segments() {
            for s in segments {
                last_empty = s.is_empty();
                if !last_empty {
                    path.push(s);
                }
            }
        }
        if last_empty {
            path.push("index.html");
        }
        path
    }

    fn is_ambiguous(&self, path: &Path) -> bool {
        if path.is_dir() {
            return true;
        }
        path.ancestors()
            .skip(1)
            .take_while(|p| p.starts_with(&self.root) && *p != self.root)
            .any(|p| p.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve() {
        let resolver = FsCachePathResolver::new(Path::new("/var/cache/swarmd"));
        let r = |s: &str| resolver.resolve(&Url::parse(s).unwrap());
        assert_eq!(
            r("http://a.example/x/y.html"),
            PathBuf::from("/var/cache/swarmd/http/a.example/x/y.html")
        );
        assert_eq!(
            r("http://a.example:8080/x/"),
            PathBuf::from("/var/cache/swarmd/http/a.example_8080/x/index.html")
        );
        assert_eq!(
            r("http://[::1]/"),
            PathBuf::from("/var/cache/swarmd/http/__1/index.html")
        );
    }

    #[test]
    fn ambiguous() {
        let root = std::env::temp_dir().join(format!("swarmd-cache-{}", std::process::id()));
        let site = root.join("http").join("a.example");
        std::fs::create_dir_all(site.join("dir")).unwrap();
        std::fs::write(site.join("file"), b"x").unwrap();

        let resolver = FsCachePathResolver::new(&root);
        let r = |s: &str| resolver.resolve(&Url::parse(s).unwrap());
        assert!(resolver.is_ambiguous(&r("http://a.example/dir")));
        assert!(resolver.is_ambiguous(&r("http://a.example/file/x.html")));
        assert!(!resolver.is_ambiguous(&r("http://a.example/dir/x.html")));
        assert!(!resolver.is_ambiguous(&r("http://a.example/new/x.html")));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
