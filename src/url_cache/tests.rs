use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize};

#[cfg(not(feature = "mock-clock"))]
use std::time::Instant;

#[cfg(feature = "mock-clock")]
use mock_instant::thread_local::Instant;

use super::*;

/// Signer that numbers every URL it hands out.
#[derive(Default)]
struct CountingSigner {
    calls: AtomicUsize,
    public: AtomicBool,
    failing: AtomicBool,
}

impl CountingSigner {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Signer for CountingSigner {
    async fn sign(&self, object_key: &str, _ttl: Duration) -> Result<String, SignerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(SignerError::new("signing unavailable"));
        }
        Ok(format!("https://signed.example/{object_key}?sig={n}"))
    }

    fn is_public(&self) -> bool {
        self.public.load(Ordering::SeqCst)
    }

    fn public_url(&self, object_key: &str) -> String {
        format!("https://public.example/{object_key}")
    }
}

fn new_cache() -> (Arc<CountingSigner>, SignedUrlCache<Arc<CountingSigner>>) {
    let signer = Arc::new(CountingSigner::default());
    let cache = SignedUrlCache::new(signer.clone(), 4, DEFAULT_TTL);
    (signer, cache)
}

#[test]
fn entry_lifetime_subtracts_margin() {
    let entry = SignedUrlEntry::new("u".into(), Duration::from_secs(3600), REFRESH_MARGIN);
    assert!(entry.is_fresh());
    assert!(entry.remaining() <= Duration::from_secs(3540));
    assert!(entry.remaining() > Duration::from_secs(3530));
}

#[test]
fn entry_lifetime_is_clamped_for_huge_ttl() {
    let entry = SignedUrlEntry::new("u".into(), Duration::MAX, REFRESH_MARGIN);

    assert!(entry.is_fresh());
    assert!(entry.remaining() <= MAX_ENTRY_LIFETIME);
    assert!(entry.remaining() > MAX_ENTRY_LIFETIME - Duration::from_secs(10));
}

#[test]
fn entry_with_ttl_below_margin_is_stale() {
    let entry = SignedUrlEntry::new("u".into(), Duration::from_secs(30), REFRESH_MARGIN);
    assert!(!entry.is_fresh());
    assert_eq!(entry.remaining(), Duration::ZERO);

    let entry = SignedUrlEntry::new("u".into(), REFRESH_MARGIN, REFRESH_MARGIN);
    assert!(!entry.is_fresh());
}

#[tokio::test]
async fn test_hit_reuses_signed_url() {
    let (signer, cache) = new_cache();

    let first = cache.get_url("u1/images/abc.png").await.unwrap();
    let second = cache.get_url("u1/images/abc.png").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(signer.calls(), 1);
    assert_eq!(cache.len().await, 1);
    assert!(cache.contains_fresh("u1/images/abc.png").await);
}

#[tokio::test]
async fn test_written_entry_expires_one_margin_early() {
    let (_signer, cache) = new_cache();

    cache
        .get_url_with_ttl("u1/images/abc.png", Duration::from_secs(3600))
        .await
        .unwrap();

    let entry = cache.entry("u1/images/abc.png").await.unwrap();
    assert_eq!(entry.url(), "https://signed.example/u1/images/abc.png?sig=1");
    assert!(entry.expires_at() > Instant::now());
    assert!(entry.remaining() <= Duration::from_secs(3540));
    assert!(entry.remaining() > Duration::from_secs(3530));
}

#[tokio::test]
async fn test_ttl_below_margin_resigns_every_call() {
    let (signer, cache) = new_cache();

    let first = cache
        .get_url_with_ttl("k", Duration::from_secs(30))
        .await
        .unwrap();
    let second = cache
        .get_url_with_ttl("k", Duration::from_secs(30))
        .await
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(signer.calls(), 2);
    // Still a single entry, overwritten in place.
    assert_eq!(cache.len().await, 1);
    assert!(!cache.contains_fresh("k").await);
}

#[tokio::test]
async fn test_max_ttl_is_cached_without_overflow() {
    let (signer, cache) = new_cache();

    let first = cache.get_url_with_ttl("k", Duration::MAX).await.unwrap();
    let second = cache.get_url_with_ttl("k", Duration::MAX).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(signer.calls(), 1);
    assert!(cache.contains_fresh("k").await);
    assert!(cache.entry("k").await.unwrap().remaining() <= MAX_ENTRY_LIFETIME);
}

#[tokio::test]
async fn test_signer_failure_leaves_store_untouched() {
    let (signer, cache) = new_cache();
    signer.failing.store(true, Ordering::SeqCst);

    let err = cache.get_url("missing.png").await.unwrap_err();

    assert_eq!(err.message(), "signing unavailable");
    assert!(cache.is_empty().await);
    assert!(cache.entry("missing.png").await.is_none());
}

#[tokio::test]
async fn test_signer_failure_never_serves_stale_entry() {
    let (signer, cache) = new_cache();

    // Written already stale.
    cache
        .get_url_with_ttl("k", Duration::from_secs(10))
        .await
        .unwrap();

    signer.failing.store(true, Ordering::SeqCst);
    assert!(cache.get_url("k").await.is_err());

    let entry = cache.entry("k").await.unwrap();
    assert_eq!(entry.url(), "https://signed.example/k?sig=1");
}

#[tokio::test]
async fn test_public_bucket_bypasses_cache() {
    let (signer, cache) = new_cache();
    signer.public.store(true, Ordering::SeqCst);

    let url = cache.get_url("u1/video/clip.mp4").await.unwrap();

    assert_eq!(url, "https://public.example/u1/video/clip.mp4");
    assert_eq!(signer.calls(), 0);
    assert!(cache.is_empty().await);
    assert_eq!(cache.lock_count().await, 0);
}

#[tokio::test]
async fn test_public_bypass_is_resolved_per_call() {
    let (signer, cache) = new_cache();

    let signed = cache.get_url("k").await.unwrap();
    signer.public.store(true, Ordering::SeqCst);
    let public = cache.get_url("k").await.unwrap();
    signer.public.store(false, Ordering::SeqCst);
    let signed_again = cache.get_url("k").await.unwrap();

    assert_eq!(public, "https://public.example/k");
    assert_eq!(signed, signed_again);
    assert_eq!(signer.calls(), 1);
}

#[tokio::test]
async fn test_lock_table_grows_per_distinct_key() {
    let (_signer, cache) = new_cache();

    for key in ["a", "b", "c", "a", "b"] {
        cache.get_url(key).await.unwrap();
    }

    assert_eq!(cache.len().await, 3);
    assert_eq!(cache.lock_count().await, 3);
    assert_eq!(
        cache.statistics().await,
        SignedUrlCacheStatistics {
            entries: 3,
            key_locks: 3,
        }
    );
}

#[tokio::test]
async fn test_get_urls_preserves_order() {
    let (signer, cache) = new_cache();

    let urls = cache
        .get_urls(&["img.png", "clip.mp4", "img.png"], DEFAULT_TTL)
        .await
        .unwrap();

    assert_eq!(
        urls,
        vec![
            "https://signed.example/img.png?sig=1".to_string(),
            "https://signed.example/clip.mp4?sig=2".to_string(),
            "https://signed.example/img.png?sig=1".to_string(),
        ]
    );
    assert_eq!(signer.calls(), 2);
}

#[tokio::test]
async fn test_single_shard_keeps_keys_apart() {
    let signer = Arc::new(CountingSigner::default());
    let cache = SignedUrlCache::new(signer.clone(), 1, DEFAULT_TTL);

    let a = cache.get_url("a").await.unwrap();
    let b = cache.get_url("b").await.unwrap();

    assert_ne!(a, b);
    assert_eq!(cache.get_url("a").await.unwrap(), a);
    assert_eq!(cache.get_url("b").await.unwrap(), b);
    assert_eq!(signer.calls(), 2);
}

#[tokio::test]
async fn test_report_stats_is_throttled() {
    let (_signer, mut cache) = new_cache();
    cache.stats_report_interval_secs = 3600;

    assert!(cache.report_stats().await);
    assert!(!cache.report_stats().await);

    cache.last_stats_report.store(0, Ordering::Relaxed);
    assert!(cache.report_stats().await);
}

#[tokio::test]
async fn test_signing_reports_stats_once_per_interval() {
    let (_signer, mut cache) = new_cache();
    cache.stats_report_interval_secs = 3600;

    cache.get_url("a").await.unwrap();
    assert_ne!(cache.last_stats_report.load(Ordering::Relaxed), 0);

    // The signing call above already reported for this interval.
    cache.get_url("b").await.unwrap();
    assert!(!cache.report_stats().await);
}

#[tokio::test]
async fn test_cache_hit_does_not_report_stats() {
    let (_signer, mut cache) = new_cache();
    cache.stats_report_interval_secs = 0;

    cache.get_url("a").await.unwrap();
    cache.last_stats_report.store(0, Ordering::Relaxed);

    cache.get_url("a").await.unwrap();
    assert_eq!(cache.last_stats_report.load(Ordering::Relaxed), 0);
}

#[test]
#[should_panic(expected = "num_shards")]
fn test_zero_shards_rejected() {
    SignedUrlCache::new(CountingSigner::default(), 0, DEFAULT_TTL);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-clock"), ignore = "requires mock-clock feature")]
async fn test_entry_goes_stale_at_margin() {
    #[cfg(feature = "mock-clock")]
    mock_instant::thread_local::MockClock::set_time(Duration::ZERO);

    let (signer, cache) = new_cache();

    let first = cache
        .get_url_with_ttl("k", Duration::from_secs(600))
        .await
        .unwrap();
    let expires_at = cache.entry("k").await.unwrap().expires_at();
    assert_eq!(expires_at.duration_since(Instant::now()), Duration::from_secs(540));

    #[cfg(feature = "mock-clock")]
    mock_instant::thread_local::MockClock::advance(Duration::from_secs(539));
    assert_eq!(cache.get_url_with_ttl("k", Duration::from_secs(600)).await.unwrap(), first);
    assert_eq!(signer.calls(), 1);

    #[cfg(feature = "mock-clock")]
    mock_instant::thread_local::MockClock::advance(Duration::from_secs(1));
    let second = cache
        .get_url_with_ttl("k", Duration::from_secs(600))
        .await
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(signer.calls(), 2);
}
