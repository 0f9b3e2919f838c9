use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use presign_cache::{Signer, SignerError};
use rand::Rng;

/// Signer standing in for an object store: fixed latency per call and an
/// optional random failure rate.
#[derive(Clone)]
pub struct SimulatedSigner {
    latency: Duration,
    failure_rate: f64,
    public: bool,
    sign_count: Arc<AtomicU64>,
    signed_count: Arc<AtomicU64>,
}

impl SimulatedSigner {
    pub fn new(latency: Duration, failure_rate: f64, public: bool) -> Self {
        Self {
            latency,
            failure_rate,
            public,
            sign_count: Arc::new(AtomicU64::new(0)),
            signed_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Signing attempts, failed ones included.
    pub fn sign_count(&self) -> u64 {
        self.sign_count.load(Ordering::Relaxed)
    }

    /// Signing attempts that returned a URL.
    pub fn signed_count(&self) -> u64 {
        self.signed_count.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl Signer for SimulatedSigner {
    async fn sign(&self, object_key: &str, ttl: Duration) -> Result<String, SignerError> {
        let n = self.sign_count.fetch_add(1, Ordering::Relaxed);

        tokio::time::sleep(self.latency).await;

        if self.failure_rate > 0.0 && rand::rng().random::<f64>() < self.failure_rate {
            return Err(SignerError::new(format!(
                "simulated signing failure for {object_key}"
            )));
        }

        self.signed_count.fetch_add(1, Ordering::Relaxed);
        Ok(format!(
            "https://sim.invalid/{object_key}?X-Expires={}&X-Signature={n:016x}",
            ttl.as_secs()
        ))
    }

    fn is_public(&self) -> bool {
        self.public
    }

    fn public_url(&self, object_key: &str) -> String {
        format!("https://public.sim.invalid/{object_key}")
    }
}
