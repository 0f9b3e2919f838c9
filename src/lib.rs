use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

pub use config::Config;
pub use error::ApplicationError;
pub use signer::{R2Signer, Signer, SignerError};
pub use url_cache::{
    DEFAULT_TTL, MAX_ENTRY_LIFETIME, REFRESH_MARGIN, SignedUrlCache, SignedUrlCacheStatistics,
    SignedUrlEntry,
};

pub mod config;
mod error;
pub mod metrics_writer;
pub mod signer;
mod telemetry;
pub mod url_cache;

pub type Result<T> = std::result::Result<T, ApplicationError>;

static CARGO_CRATE_NAME: &str = env!("CARGO_CRATE_NAME");

/// Process-wide URL cache together with the telemetry it reports through.
///
/// Built once at startup by [`init`]; request handlers share the cache via
/// [`UrlCacheRuntime::cache`].
pub struct UrlCacheRuntime {
    cache: Arc<SignedUrlCache<R2Signer>>,
    metrics_writer: Option<JoinHandle<Result<()>>>,
    metrics_provider: opentelemetry_sdk::metrics::SdkMeterProvider,
    logs_provider: Option<opentelemetry_sdk::logs::SdkLoggerProvider>,
}

impl UrlCacheRuntime {
    pub fn cache(&self) -> Arc<SignedUrlCache<R2Signer>> {
        self.cache.clone()
    }

    /// Stop the metrics writer and flush telemetry.
    pub async fn shutdown(self) {
        info!("Shutting down {CARGO_CRATE_NAME}");

        if let Some(metrics_writer) = self.metrics_writer {
            metrics_writer.abort();
            match metrics_writer.await {
                Ok(Err(error)) => error!("Metrics writer failed: {error}"),
                Ok(Ok(())) => {}
                Err(join_error) if join_error.is_cancelled() => {}
                Err(join_error) => error!("Metrics writer panicked: {join_error}"),
            }
        }

        telemetry::shutdown_metrics(self.metrics_provider);
        telemetry::shutdown_logs(self.logs_provider);
    }
}

/// Initialize telemetry, connect the R2 signer and build the URL cache.
///
/// Must run inside a tokio runtime, once per process: the tracing subscriber
/// is installed globally.
pub async fn init(config: Config) -> Result<UrlCacheRuntime> {
    let (metrics_provider, logs_provider) = telemetry::initialize_telemetry(&config)?;

    info!("Starting {CARGO_CRATE_NAME} with {config}");

    let signer = R2Signer::connect(&config).await;

    let cache = Arc::new(SignedUrlCache::new(
        signer,
        config.url_cache_shards,
        Duration::from_secs(config.url_cache_default_ttl_seconds),
    ));

    let metrics_writer = config.prometheus_textfile_dir.clone().map(|textfile_dir| {
        tokio::spawn(metrics_writer::start_metrics_writer(
            textfile_dir,
            cache.clone(),
        ))
    });

    Ok(UrlCacheRuntime {
        cache,
        metrics_writer,
        metrics_provider,
        logs_provider,
    })
}
