use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use presign_cache::{Signer, SignerError};
use tokio::sync::{Mutex, Semaphore};

pub mod helpers;

/// In-memory signer for testing
#[derive(Clone)]
pub struct MockSigner {
    sign_count: Arc<AtomicU64>,
    sign_log: Arc<Mutex<Vec<(String, Duration)>>>,
    latency: Duration,
    failing: Arc<AtomicBool>,
    public: Arc<AtomicBool>,
    gated_keys: Arc<HashSet<String>>,
    gate: Arc<Semaphore>,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            sign_count: Arc::new(AtomicU64::new(0)),
            sign_log: Arc::new(Mutex::new(Vec::new())),
            latency: Duration::ZERO,
            failing: Arc::new(AtomicBool::new(false)),
            public: Arc::new(AtomicBool::new(false)),
            gated_keys: Arc::new(HashSet::new()),
            gate: Arc::new(Semaphore::new(0)),
        }
    }

    /// Every signing call sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Signing calls for `keys` block until [`MockSigner::open_gate`] is called.
    pub fn with_gated_keys(mut self, keys: &[&str]) -> Self {
        self.gated_keys = Arc::new(keys.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn open_gate(&self) {
        self.gate.close();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_public(&self, public: bool) {
        self.public.store(public, Ordering::SeqCst);
    }

    /// Number of times `sign` was invoked, failed calls included
    pub fn sign_count(&self) -> u64 {
        self.sign_count.load(Ordering::SeqCst)
    }

    pub async fn sign_log(&self) -> Vec<(String, Duration)> {
        self.sign_log.lock().await.clone()
    }
}

#[async_trait]
impl Signer for MockSigner {
    async fn sign(&self, object_key: &str, ttl: Duration) -> Result<String, SignerError> {
        let n = self.sign_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.sign_log
            .lock()
            .await
            .push((object_key.to_string(), ttl));

        if self.gated_keys.contains(object_key) {
            // A closed semaphore releases every waiter.
            let _ = self.gate.acquire().await;
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(SignerError::new("mock signer failure"));
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
