//! Response-level memoization of whole batches.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use scrape_core::{BatchResponse, ScrapeRequest};
use scrape_logging::{scrape_debug, scrape_warn};
use sha2::{Digest, Sha256};

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Intended for tests and replay.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Deterministic key for a request against `endpoint`.
///
/// The URL list is hashed in its given order because it drives the order of
/// the response. Caller identity is deliberately not part of the key.
pub fn cache_key(endpoint: &str, request: &ScrapeRequest) -> String {
    // Serializing a list of strings cannot fail.
    let payload = serde_json::to_string(request).unwrap_or_else(|_| format!("{request:?}"));
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update(b":");
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[derive(Debug, Clone)]
struct CacheEntry {
    created_at: Instant,
    value: BatchResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
}

/// In-memory TTL cache. Expiry is checked lazily on read; concurrent misses
/// for the same key race and the last `put` wins.
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached response if it is younger than the TTL. Expired
    /// entries are purged here; a poisoned lock reads as a miss.
    pub fn get(&self, key: &str) -> Option<BatchResponse> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().ok()?;
            let entry = entries.get(key)?;
            if now.saturating_duration_since(entry.created_at) < self.ttl {
                return Some(entry.value.clone());
            }
        }

        scrape_debug!("cache entry {} expired", scrape_logging::abbreviate(key));
        if let Ok(mut entries) = self.entries.write() {
            let still_expired = entries
                .get(key)
                .is_some_and(|entry| now.saturating_duration_since(entry.created_at) >= self.ttl);
            if still_expired {
                entries.remove(key);
            }
        }
        None
    }

    pub fn put(&self, key: impl Into<String>, value: BatchResponse) {
        let entry = CacheEntry {
            created_at: self.clock.now(),
            value,
        };
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.into(), entry);
            }
            Err(_) => scrape_warn!("result cache lock poisoned; skipping write"),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let Ok(entries) = self.entries.read() else {
            return CacheStats {
                total: 0,
                expired: 0,
            };
        };
        let expired = entries
            .values()
            .filter(|entry| now.saturating_duration_since(entry.created_at) >= self.ttl)
            .count();
        CacheStats {
            total: entries.len(),
            expired,
        }
    }
}
