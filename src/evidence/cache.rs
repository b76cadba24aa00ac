//! URL Cache (C5): persistent `url -> {summary, raw, ts}` with TTL and
//! stats (spec §4.5). Two-tier like the teacher's `TieredCache`
//! (`cache.rs`) — an in-memory `DashMap` tier backed by a persistent
//! tier — but the persistent tier here is a single on-disk JSON document
//! rather than Redis, since the cache only needs to survive process
//! restarts, not be shared across processes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use url::Url;

use crate::models::cache::{CacheEntry, CacheStats};

const FLUSH_EVERY_N_PUTS: u64 = 16;

/// Query parameters stripped during canonicalization — a fixed deny-list
/// of common tracking parameters (spec §4.5 "strip tracking query
/// parameters from a configured deny-list").
const TRACKING_PARAM_DENYLIST: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "ref",
    "mc_cid",
    "mc_eid",
];

pub struct UrlCache {
    entries: DashMap<String, CacheEntry>,
    stats: CacheStats,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
    puts_since_flush: AtomicU64,
    path: PathBuf,
    ttl_seconds: u64,
    // Serializes writes to the on-disk document; reads never take it.
    flush_lock: AsyncMutex<()>,
}

impl UrlCache {
    /// Load from `path` if present, starting a fresh cache if the file is
    /// missing or corrupt (the corrupt file is renamed aside, per spec
    /// §4.5 "On startup, a corrupt file is renamed aside").
    pub fn load(path: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        let path = path.into();
        let entries = DashMap::new();
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&contents) {
                    Ok(loaded) => {
                        for (k, v) in loaded {
                            entries.insert(k, v);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, path = %path.display(), "corrupt cache file, starting fresh");
                        quarantine(&path);
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to read cache file, starting fresh");
                }
            }
        }
        Self {
            entries,
            stats: CacheStats::default(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            puts_since_flush: AtomicU64::new(0),
            path,
            ttl_seconds,
            flush_lock: AsyncMutex::new(()),
        }
    }

    /// Canonicalize a URL: lowercase host, strip fragment, drop
    /// denylisted tracking params, sort remaining query keys.
    pub fn canonicalize(raw_url: &str) -> String {
        let Ok(mut url) = Url::parse(raw_url) else {
            return raw_url.trim().to_string();
        };
        url.set_fragment(None);
        if let Some(host) = url.host_str() {
            let lower = host.to_lowercase();
            let _ = url.set_host(Some(&lower));
        }
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAM_DENYLIST.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            let query = pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
        url.to_string()
    }

    /// I4: an entry with `now >= expires_at` is treated as absent.
    pub fn get(&self, raw_url: &str) -> Option<CacheEntry> {
        let key = Self::canonicalize(raw_url);
        let now = Utc::now();
        match self.entries.get(&key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an entry and flush to disk every `FLUSH_EVERY_N_PUTS`
    /// puts (spec §4.5 "on every Nth put (N=16)").
    pub async fn put(&self, raw_url: &str, summary: String, raw_text_truncated: String, now: DateTime<Utc>) {
        let key = Self::canonicalize(raw_url);
        let entry = CacheEntry {
            url: key.clone(),
            summary_bytes: summary.len(),
            raw_bytes: raw_text_truncated.len(),
            summary,
            raw_text_truncated,
            created_at: now,
            expires_at: now + chrono::Duration::seconds(self.ttl_seconds as i64),
        };
        self.entries.insert(key, entry);
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.puts_since_flush.fetch_add(1, Ordering::Relaxed) + 1 >= FLUSH_EVERY_N_PUTS {
            self.puts_since_flush.store(0, Ordering::Relaxed);
            self.flush().await;
        }
    }

    pub fn invalidate(&self, raw_url: &str) {
        let key = Self::canonicalize(raw_url);
        if self.entries.remove(&key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Serialize the whole cache to `self.path` (spec §4.5 "serializes to
    /// a single on-disk document"). Called on shutdown and periodically.
    pub async fn flush(&self) {
        let _guard = self.flush_lock.lock().await;
        let snapshot: HashMap<String, CacheEntry> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let json = serde_json::to_vec(&snapshot)?;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("tmp");
            std::fs::write(&tmp, json)?;
            std::fs::rename(tmp, path)
        })
        .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "cache flush task panicked");
        } else if let Err(e) = result.unwrap() {
            tracing::error!(error = %e, "cache flush failed");
        }
    }
}

fn quarantine(path: &std::path::Path) {
    let quarantined = path.with_extension("corrupt");
    let _ = std::fs::rename(path, quarantined);
}

pub type SharedUrlCache = Arc<UrlCache>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_lowercases_host_and_strips_fragment() {
        let c = UrlCache::canonicalize("HTTPS://Example.COM/path#section");
        assert_eq!(c, "https://example.com/path");
    }

    #[test]
    fn canonicalize_strips_tracking_params_and_sorts_rest() {
        let c = UrlCache::canonicalize("https://example.com/?b=2&utm_source=x&a=1");
        assert_eq!(c, "https://example.com/?a=1&b=2");
    }

    #[tokio::test]
    async fn get_returns_none_for_expired_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = UrlCache::load(dir.path().join("cache.json"), 1);
        let past = Utc::now() - chrono::Duration::seconds(10);
        cache
            .put("https://example.com", "summary".into(), "raw".into(), past)
            .await;
        assert!(cache.get("https://example.com").is_none());
    }

    #[tokio::test]
    async fn put_then_get_hits_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let cache = UrlCache::load(dir.path().join("cache.json"), 3600);
        cache
            .put("https://example.com", "summary".into(), "raw".into(), Utc::now())
            .await;
        let entry = cache.get("https://example.com").unwrap();
        assert_eq!(entry.summary, "summary");
    }
}
