use std::time::Duration;

#[cfg(not(feature = "mock-clock"))]
use std::time::Instant;

#[cfg(feature = "mock-clock")]
use mock_instant::thread_local::Instant;

/// Longest time an entry is served; longer lifetimes are clamped to it.
pub const MAX_ENTRY_LIFETIME: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A signed URL together with the instant it stops being served.
///
/// Entries are immutable; a refresh replaces the whole entry.
#[derive(Clone, Debug)]
pub struct SignedUrlEntry {
    url: String,
    expires_at: Instant,
}

impl SignedUrlEntry {
    /// Entry for a URL signed for `ttl`, retired `margin` before the signature lapses.
    ///
    /// A `ttl` at or below `margin` yields an entry that is already stale.
    pub fn new(url: String, ttl: Duration, margin: Duration) -> Self {
        let now = Instant::now();
        let lifetime = ttl.saturating_sub(margin).min(MAX_ENTRY_LIFETIME);

        Self {
            url,
            // Unrepresentable expiry: stale right away, so the next call re-signs.
            expires_at: now.checked_add(lifetime).unwrap_or(now),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }

    /// Time left before the entry goes stale, zero once it has.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}
