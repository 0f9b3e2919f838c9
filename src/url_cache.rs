use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, error};

pub use self::entry::{MAX_ENTRY_LIFETIME, SignedUrlEntry};
use self::shard::UrlCacheShard;

use crate::signer::{Signer, SignerError};
use crate::telemetry;

mod entry;
mod shard;

/// Safety buffer subtracted from the requested TTL when an entry is written,
/// so cached URLs are retired before their signature actually lapses.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Validity requested when callers do not pick one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Statistics about the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SignedUrlCacheStatistics {
    pub entries: usize,
    pub key_locks: usize,
}

/// Cache of presigned URLs keyed by object key.
///
/// A lookup serves the cached URL while it is fresh without taking the key's
/// refresh lock. On a miss the caller takes the per-key lock, checks again,
/// and only then asks the signer for a new URL, so concurrent misses for one
/// key collapse into a single signing call. Keys are spread across shards by
/// hash; a shard's maps are locked only for the lookup or insert itself.
///
/// Entries are never evicted and the per-key locks are never dropped: both
/// grow with the number of distinct object keys ever requested.
pub struct SignedUrlCache<S> {
    signer: S,
    shards: Vec<UrlCacheShard>,
    default_ttl: Duration,
    last_stats_report: AtomicU64,
    stats_report_interval_secs: u64,
}

impl<S: Signer> SignedUrlCache<S> {
    pub fn new(signer: S, num_shards: usize, default_ttl: Duration) -> Self {
        assert!(num_shards > 0, "num_shards must be greater than 0");

        let shards = (0..num_shards).map(|_| UrlCacheShard::new()).collect();

        Self {
            signer,
            shards,
            default_ttl,
            last_stats_report: AtomicU64::new(0),
            stats_report_interval_secs: 1,
        }
    }

    #[inline]
    fn shard_for(&self, object_key: &str) -> &UrlCacheShard {
        let mut hasher = DefaultHasher::new();
        object_key.hash(&mut hasher);
        &self.shards[hasher.finish() as usize % self.shards.len()]
    }

    /// URL for `object_key` valid for the cache's default TTL.
    pub async fn get_url(&self, object_key: &str) -> Result<String, SignerError> {
        self.get_url_with_ttl(object_key, self.default_ttl).await
    }

    /// URL for `object_key`, signing a new one only when no fresh URL is cached.
    ///
    /// A returned URL stays valid for at least `ttl - REFRESH_MARGIN` from the
    /// time it was cached. The signer runs at most once per call; its errors
    /// are returned as-is and leave the cached entry untouched. A stale entry
    /// is never served, even when signing fails.
    pub async fn get_url_with_ttl(
        &self,
        object_key: &str,
        ttl: Duration,
    ) -> Result<String, SignerError> {
        if self.signer.is_public() {
            telemetry::record_public_bypass();
            return Ok(self.signer.public_url(object_key));
        }

        let shard = self.shard_for(object_key);

        if let Some(url) = shard.fresh_url(object_key).await {
            debug!(object_key, "url cache hit");
            telemetry::record_url_cache_hit();
            return Ok(url);
        }

        debug!(object_key, "url cache miss");
        telemetry::record_url_cache_miss();

        let key_lock = shard.key_lock(object_key).await;
        let refresh_guard = key_lock.lock().await;

        // Another caller may have refreshed the entry while we waited.
        if let Some(url) = shard.fresh_url(object_key).await {
            debug!(object_key, "url refreshed by concurrent caller");
            telemetry::record_coalesced_refresh();
            return Ok(url);
        }

        let url = self
            .signer
            .sign(object_key, ttl)
            .await
            .inspect_err(|err| {
                error!(object_key, error = %err, "failed to sign url");
                telemetry::record_signer_error();
            })?;

        debug!(object_key, ttl_secs = ttl.as_secs(), "signed new url");
        telemetry::record_url_signed();

        shard
            .store(
                object_key,
                SignedUrlEntry::new(url.clone(), ttl, REFRESH_MARGIN),
            )
            .await;
        drop(refresh_guard);

        self.report_stats().await;

        Ok(url)
    }

    /// URLs for several keys, in order. The first signing error aborts the batch.
    pub async fn get_urls<K: AsRef<str>>(
        &self,
        object_keys: &[K],
        ttl: Duration,
    ) -> Result<Vec<String>, SignerError> {
        let mut urls = Vec::with_capacity(object_keys.len());
        for object_key in object_keys {
            urls.push(self.get_url_with_ttl(object_key.as_ref(), ttl).await?);
        }
        Ok(urls)
    }

    /// Whether a URL for `object_key` would be served without signing.
    pub async fn contains_fresh(&self, object_key: &str) -> bool {
        self.shard_for(object_key)
            .fresh_url(object_key)
            .await
            .is_some()
    }

    /// The cached entry for `object_key`, including stale ones.
    pub async fn entry(&self, object_key: &str) -> Option<SignedUrlEntry> {
        self.shard_for(object_key)
            .entry(object_key)
            .await
            .map(|entry| entry.as_ref().clone())
    }

    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.len().await;
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of per-key refresh locks created so far.
    pub async fn lock_count(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock_count().await;
        }
        total
    }

    pub async fn statistics(&self) -> SignedUrlCacheStatistics {
        SignedUrlCacheStatistics {
            entries: self.len().await,
            key_locks: self.lock_count().await,
        }
    }

    /// Report current cache statistics as metrics.
    ///
    /// Uses time-based throttling to avoid overhead on hot path. Returns
    /// whether this call exported the statistics.
    pub async fn report_stats(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        let last = self.last_stats_report.load(Ordering::Relaxed);
        if now.saturating_sub(last) < self.stats_report_interval_secs {
            return false;
        }

        // Losing the race only means another caller reports this interval.
        if self
            .last_stats_report
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let stats = self.statistics().await;
        telemetry::record_cache_stats(stats.entries, stats.key_locks);
        true
    }
}

#[cfg(test)]
mod tests;
