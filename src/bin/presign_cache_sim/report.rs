/// How the successful requests of a run were served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServedBreakdown {
    pub public: u64,
    pub signed: u64,
    pub cached: u64,
    pub failed: u64,
}

impl ServedBreakdown {
    /// Split `total` requests by outcome.
    ///
    /// Every successful signature answers exactly one request, so the rest of
    /// the successful requests were served from the cache. A public bucket
    /// never signs or caches.
    pub fn new(total: u64, failed: u64, signed_ok: u64, public: bool) -> Self {
        let succeeded = total.saturating_sub(failed);

        if public {
            return Self {
                public: succeeded,
                signed: 0,
                cached: 0,
                failed,
            };
        }

        let signed = signed_ok.min(succeeded);
        Self {
            public: 0,
            signed,
            cached: succeeded - signed,
            failed,
        }
    }

    /// Share of all requests served from the cache, in percent.
    pub fn hit_rate(&self, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.cached as f64 / total as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_not_counted_as_cached() {
        // 100 requests, 10 signing attempts of which 4 failed.
        let breakdown = ServedBreakdown::new(100, 4, 6, false);

        assert_eq!(
            breakdown,
            ServedBreakdown {
                public: 0,
                signed: 6,
                cached: 90,
                failed: 4,
            }
        );
        assert_eq!(breakdown.hit_rate(100), 90.0);
    }

    #[test]
    fn public_bucket_reports_no_cache_hits() {
        let breakdown = ServedBreakdown::new(100, 0, 0, true);

        assert_eq!(breakdown.public, 100);
        assert_eq!(breakdown.cached, 0);
        assert_eq!(breakdown.hit_rate(100), 0.0);
    }

    #[test]
    fn uncached_run_signs_every_success() {
        let breakdown = ServedBreakdown::new(50, 5, 45, false);

        assert_eq!(breakdown.signed, 45);
        assert_eq!(breakdown.cached, 0);
    }

    #[test]
    fn empty_run() {
        let breakdown = ServedBreakdown::new(0, 0, 0, false);

        assert_eq!(breakdown.cached, 0);
        assert_eq!(breakdown.hit_rate(0), 0.0);
    }
}
