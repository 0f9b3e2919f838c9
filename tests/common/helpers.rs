use std::sync::Arc;
use std::time::Duration;

use presign_cache::{DEFAULT_TTL, SignedUrlCache};

use super::MockSigner;

/// Build a fresh cache around `signer`
pub fn create_test_cache(signer: &MockSigner, num_shards: usize) -> Arc<SignedUrlCache<MockSigner>> {
    Arc::new(SignedUrlCache::new(signer.clone(), num_shards, DEFAULT_TTL))
}

/// Fire `callers` concurrent lookups for `key` and collect their URLs
pub async fn concurrent_get_url(
    cache: &Arc<SignedUrlCache<MockSigner>>,
    key: &str,
    ttl: Duration,
    callers: usize,
) -> Vec<String> {
    let barrier = Arc::new(tokio::sync::Barrier::new(callers));

    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                barrier.wait().await;
                cache.get_url_with_ttl(&key, ttl).await
            })
        })
        .collect();

    let mut urls = Vec::with_capacity(callers);
    for handle in handles {
        urls.push(handle.await.expect("task panicked").expect("signing failed"));
    }
    urls
}

pub async fn assert_cache_fresh(cache: &Arc<SignedUrlCache<MockSigner>>, key: &str) {
    assert!(
        cache.contains_fresh(key).await,
        "expected a fresh url for {key}"
    );
}

pub async fn assert_cache_missing(cache: &Arc<SignedUrlCache<MockSigner>>, key: &str) {
    assert!(
        cache.entry(key).await.is_none(),
        "expected no entry for {key}"
    );
}
