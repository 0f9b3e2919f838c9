use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, TextEncoder};
use tracing::{debug, error, info};

use crate::signer::Signer;
use crate::telemetry;
use crate::url_cache::SignedUrlCache;

const METRICS_FILE_NAME: &str = "presign_cache.prom";
const WRITE_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically write the Prometheus registry to `<textfile_dir>/presign_cache.prom`
/// for node_exporter's textfile collector.
///
/// Cache statistics are refreshed before every write. A failed write is logged
/// and retried on the next tick; the task only ends when it is aborted.
pub async fn start_metrics_writer<S: Signer>(
    textfile_dir: String,
    cache: Arc<SignedUrlCache<S>>,
) -> crate::Result<()> {
    let final_path = Path::new(&textfile_dir).join(METRICS_FILE_NAME);
    let tmp_path = final_path.with_extension("prom.tmp");

    info!(
        "Prometheus metrics writer started, writing to {}",
        final_path.display()
    );

    let mut interval = tokio::time::interval(WRITE_INTERVAL);

    loop {
        interval.tick().await;

        match write_snapshot(&cache, &tmp_path, &final_path).await {
            Ok(written) => {
                debug!(
                    "Successfully wrote {} bytes to {}",
                    written,
                    final_path.display()
                );
            }
            Err(e) => {
                error!("Failed to write metrics file: {}", e);
            }
        }
    }
}

async fn write_snapshot<S: Signer>(
    cache: &SignedUrlCache<S>,
    tmp_path: &Path,
    final_path: &Path,
) -> crate::Result<usize> {
    let stats = cache.statistics().await;
    telemetry::record_cache_stats(stats.entries, stats.key_locks);

    let buffer = encode_registry()?;
    write_metrics_atomic(tmp_path, final_path, &buffer)?;

    Ok(buffer.len())
}

fn encode_registry() -> crate::Result<Vec<u8>> {
    let metric_families = telemetry::PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|e| {
            crate::ApplicationError::Internal(format!("failed to encode Prometheus metrics: {e}"))
        })?;

    Ok(buffer)
}

/// Write metrics to file atomically using write-to-temp + rename pattern.
///
/// This ensures node_exporter never reads a partially written file.
fn write_metrics_atomic(tmp_path: &Path, final_path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    std::fs::rename(tmp_path, final_path)?;

    Ok(())
}
