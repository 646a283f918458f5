//! Delivery URL resolution with a signed-URL cache
//!
//! Resolution order: cached signed URL, fresh signed URL, public URL.
//! A cached entry is reused only while it still has more than
//! [`SAFETY_MARGIN_SECS`] of validity left, so a link never expires while
//! Telegram is still fetching the video.

use crate::catalog::ContentDescriptor;
use crate::storage::ObjectStore;
use chrono::{DateTime, TimeDelta, Utc};
use moka::future::Cache;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifetime requested for signed URLs.
pub const SIGNED_URL_TTL_SECS: u32 = 3600;
/// Minimum remaining validity for a cached URL to be reused.
pub const SAFETY_MARGIN_SECS: u32 = 15;
/// Upper bound on cached entries; keyed by catalog path so rarely reached.
pub const URL_CACHE_MAX_CAPACITY: u64 = 1_000;

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// A signed URL and the moment it stops working
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedUrl {
    /// Signed URL
    pub url: String,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
}

impl CachedUrl {
    /// Whether the entry can still be handed out at `now`
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(i64::from(SAFETY_MARGIN_SECS)) < self.expires_at
    }
}

/// Where a resolved URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSource {
    /// Reused signed URL
    Cache,
    /// Freshly signed URL
    Signed,
    /// Permanent public URL (degraded)
    Public,
}

/// A usable delivery URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    /// URL handed to Telegram
    pub url: String,
    /// Origin of the URL
    pub source: UrlSource,
}

/// Resolves content descriptors to delivery URLs
pub struct UrlResolver {
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    cache: Cache<(String, String), CachedUrl>,
}

impl UrlResolver {
    /// Create a resolver using the system clock
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create a resolver with an explicit clock
    #[must_use]
    pub fn with_clock(store: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        let cache = Cache::builder()
            .max_capacity(URL_CACHE_MAX_CAPACITY)
            .time_to_live(Duration::from_secs(u64::from(SIGNED_URL_TTL_SECS)))
            .build();

        Self {
            store,
            clock,
            cache,
        }
    }

    /// Resolve a delivery URL for `descriptor`.
    ///
    /// Returns `None` when no bucket is configured or neither a signed nor a
    /// public URL can be produced.
    pub async fn resolve(
        &self,
        bucket: Option<&str>,
        descriptor: &ContentDescriptor,
    ) -> Option<ResolvedUrl> {
        let Some(bucket) = bucket else {
            debug!(key = %descriptor.key, "No storage bucket configured; delivery unavailable");
            return None;
        };

        let cache_key = (bucket.to_string(), descriptor.storage_path.clone());
        let now = self.clock.now();

        if let Some(entry) = self.cache.get(&cache_key).await {
            if entry.is_fresh(now) {
                debug!(path = %descriptor.storage_path, "Signed URL cache hit");
                return Some(ResolvedUrl {
                    url: entry.url,
                    source: UrlSource::Cache,
                });
            }
        }

        let ttl = Duration::from_secs(u64::from(SIGNED_URL_TTL_SECS));
        match self
            .store
            .signed_url(bucket, &descriptor.storage_path, ttl)
            .await
        {
            Ok(url) => {
                let entry = CachedUrl {
                    url: url.clone(),
                    expires_at: now + TimeDelta::seconds(i64::from(SIGNED_URL_TTL_SECS)),
                };
                self.cache.insert(cache_key, entry).await;
                info!(path = %descriptor.storage_path, "Signed URL refreshed");
                Some(ResolvedUrl {
                    url,
                    source: UrlSource::Signed,
                })
            }
            Err(e) => {
                warn!(
                    path = %descriptor.storage_path,
                    error = %e,
                    "Signed URL unavailable, falling back to public URL"
                );
                let url = self.store.public_url(bucket, &descriptor.storage_path);
                if url.is_none() {
                    warn!(path = %descriptor.storage_path, "No public URL available either");
                }
                url.map(|url| ResolvedUrl {
                    url,
                    source: UrlSource::Public,
                })
            }
        }
    }
}
