use std::sync::Arc;
use std::time::Duration;

pub use self::r2::R2Signer;

mod r2;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Produces time-limited access URLs for stored objects.
///
/// The URL cache treats implementations as black boxes: no retries, no
/// timeouts, and any error is handed straight back to the caller.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Sign `object_key` so the returned URL stays valid for `ttl`.
    async fn sign(&self, object_key: &str, ttl: Duration) -> Result<String, SignerError>;

    /// Whether the backing bucket is publicly readable.
    ///
    /// Evaluated on every lookup; a public bucket bypasses the cache entirely.
    fn is_public(&self) -> bool;

    /// Static, unsigned URL for `object_key` on a public bucket.
    fn public_url(&self, object_key: &str) -> String;
}

#[async_trait::async_trait]
impl<T: Signer + ?Sized> Signer for Arc<T> {
    async fn sign(&self, object_key: &str, ttl: Duration) -> Result<String, SignerError> {
        (**self).sign(object_key, ttl).await
    }

    fn is_public(&self) -> bool {
        (**self).is_public()
    }

    fn public_url(&self, object_key: &str) -> String {
        (**self).public_url(object_key)
    }
}

/// The signing call failed (network, credentials, or service error).
pub struct SignerError {
    message: String,
    source: Option<BoxedSource>,
}

impl SignerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::error::Error for SignerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

impl std::fmt::Display for SignerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {source}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::fmt::Debug for SignerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self, f)
    }
}
