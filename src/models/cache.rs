use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `spec.md` §3 "CacheEntry". Expiry defaults to `created_at + 24h`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub summary: String,
    pub raw_text_truncated: String,
    pub summary_bytes: usize,
    pub raw_bytes: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Invariant I4: an entry with `now >= expires_at` is treated as absent.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
}
