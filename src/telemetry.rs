use std::{sync::LazyLock, time::Duration};

use opentelemetry::metrics::{Counter, Gauge};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use prometheus::{IntCounter, IntGauge, Registry};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{CARGO_CRATE_NAME, Config};

static RESOURCE: LazyLock<opentelemetry_sdk::Resource> = LazyLock::new(|| {
    opentelemetry_sdk::Resource::builder()
        .with_service_name(CARGO_CRATE_NAME)
        .build()
});

// Prometheus registry and metrics

pub(crate) static PROMETHEUS_REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    Registry::new_custom(Some("presign_cache".to_string()), None)
        .expect("Failed to create Prometheus registry")
});

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("invalid Prometheus counter");
    PROMETHEUS_REGISTRY
        .register(Box::new(counter.clone()))
        .expect("duplicate Prometheus counter");
    counter
}

fn register_gauge(name: &str, help: &str) -> IntGauge {
    let gauge = IntGauge::new(name, help).expect("invalid Prometheus gauge");
    PROMETHEUS_REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("duplicate Prometheus gauge");
    gauge
}

static PROM_URL_CACHE_HIT: LazyLock<IntCounter> =
    LazyLock::new(|| register_counter("url_cache_hit_total", "Number of url cache hits"));

static PROM_URL_CACHE_MISS: LazyLock<IntCounter> =
    LazyLock::new(|| register_counter("url_cache_miss_total", "Number of url cache misses"));

static PROM_URL_CACHE_COALESCED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "url_cache_coalesced_total",
        "Number of misses served by a concurrent caller's refresh",
    )
});

static PROM_URL_SIGNED: LazyLock<IntCounter> =
    LazyLock::new(|| register_counter("url_signed_total", "Number of urls signed"));

static PROM_SIGNER_ERROR: LazyLock<IntCounter> =
    LazyLock::new(|| register_counter("signer_error_total", "Number of failed signing calls"));

static PROM_PUBLIC_BYPASS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "public_bypass_total",
        "Number of lookups answered with a public bucket url",
    )
});

static PROM_URL_CACHE_ENTRIES: LazyLock<IntGauge> =
    LazyLock::new(|| register_gauge("url_cache_entries", "Current number of cached urls"));

static PROM_URL_CACHE_KEY_LOCKS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_gauge(
        "url_cache_key_locks",
        "Current number of per-key refresh locks",
    )
});

pub(crate) fn initialize_telemetry(
    config: &Config,
) -> crate::Result<(
    opentelemetry_sdk::metrics::SdkMeterProvider,
    Option<opentelemetry_sdk::logs::SdkLoggerProvider>,
)> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let logs_provider = init_logs(config.otel_grpc_endpoint_url.as_deref())?;

    match logs_provider.as_ref() {
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
        Some(logs_provider) => {
            let otel_layer = OpenTelemetryTracingBridge::new(logs_provider);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(otel_layer)
                .init();
        }
    }

    let metrics_provider = init_metrics(config.otel_grpc_endpoint_url.as_deref())?;

    Ok((metrics_provider, logs_provider))
}

fn init_logs(
    otel_grpc_endpoint_url: Option<&str>,
) -> crate::Result<Option<opentelemetry_sdk::logs::SdkLoggerProvider>> {
    let Some(otel_grpc_endpoint_url) = otel_grpc_endpoint_url else {
        return Ok(None);
    };

    let otlp_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_compression(Compression::Gzip)
        .with_endpoint(otel_grpc_endpoint_url)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    let provider = opentelemetry_sdk::logs::SdkLoggerProvider::builder()
        .with_resource(RESOURCE.clone())
        .with_batch_exporter(otlp_exporter)
        .build();

    Ok(Some(provider))
}

pub(crate) fn shutdown_logs(logs_provider: Option<opentelemetry_sdk::logs::SdkLoggerProvider>) {
    let Some(logs_provider) = logs_provider else {
        return;
    };

    if let Err(error) = logs_provider.shutdown() {
        error!("Error during logs shutdown: {error:?}");
    }
}

fn init_metrics(
    otel_grpc_endpoint_url: Option<&str>,
) -> crate::Result<opentelemetry_sdk::metrics::SdkMeterProvider> {
    let builder =
        opentelemetry_sdk::metrics::SdkMeterProvider::builder().with_resource(RESOURCE.clone());

    let provider = match otel_grpc_endpoint_url {
        None => {
            info!("opentelemetry_stdout initialized");
            builder.with_periodic_exporter(opentelemetry_stdout::MetricExporter::default())
        }
        Some(otel_grpc_endpoint_url) => {
            info!("opentelemetry_otlp initialized");
            let otlp_exporter = opentelemetry_otlp::MetricExporter::builder()
                .with_tonic()
                .with_compression(Compression::Gzip)
                .with_endpoint(otel_grpc_endpoint_url)
                .with_timeout(Duration::from_secs(5))
                .build()?;

            builder.with_periodic_exporter(otlp_exporter)
        }
    }
    .build();

    opentelemetry::global::set_meter_provider(provider.clone());

    Ok(provider)
}

pub(crate) fn shutdown_metrics(metric_provider: opentelemetry_sdk::metrics::SdkMeterProvider) {
    if let Err(error) = metric_provider.shutdown() {
        error!("Error during metric shutdown: {error:?}");
    }
}

// URL cache metrics

static URL_CACHE_HIT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_counter("url_cache.hit")
        .with_description("Number of url cache hits")
        .build()
});

static URL_CACHE_MISS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_counter("url_cache.miss")
        .with_description("Number of url cache misses")
        .build()
});

static URL_CACHE_COALESCED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_counter("url_cache.coalesced")
        .with_description("Number of misses served by a concurrent caller's refresh")
        .build()
});

static URL_SIGNED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_counter("url_cache.signed")
        .with_description("Number of urls signed")
        .build()
});

static SIGNER_ERROR: LazyLock<Counter<u64>> = LazyLock::new(|| {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_counter("url_cache.signer_error")
        .with_description("Number of failed signing calls")
        .build()
});

static PUBLIC_BYPASS: LazyLock<Counter<u64>> = LazyLock::new(|| {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_counter("url_cache.public_bypass")
        .with_description("Number of lookups answered with a public bucket url")
        .build()
});

static URL_CACHE_ENTRIES: LazyLock<Gauge<u64>> = LazyLock::new(|| {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_gauge("url_cache.entries")
        .with_description("Current number of cached urls")
        .build()
});

static URL_CACHE_KEY_LOCKS: LazyLock<Gauge<u64>> = LazyLock::new(|| {
    opentelemetry::global::meter(CARGO_CRATE_NAME)
        .u64_gauge("url_cache.key_locks")
        .with_description("Current number of per-key refresh locks")
        .build()
});

pub(crate) fn record_url_cache_hit() {
    URL_CACHE_HIT.add(1, &[]);
    PROM_URL_CACHE_HIT.inc();
}

pub(crate) fn record_url_cache_miss() {
    URL_CACHE_MISS.add(1, &[]);
    PROM_URL_CACHE_MISS.inc();
}

pub(crate) fn record_coalesced_refresh() {
    URL_CACHE_COALESCED.add(1, &[]);
    PROM_URL_CACHE_COALESCED.inc();
}

pub(crate) fn record_url_signed() {
    URL_SIGNED.add(1, &[]);
    PROM_URL_SIGNED.inc();
}

pub(crate) fn record_signer_error() {
    SIGNER_ERROR.add(1, &[]);
    PROM_SIGNER_ERROR.inc();
}

pub(crate) fn record_public_bypass() {
    PUBLIC_BYPASS.add(1, &[]);
    PROM_PUBLIC_BYPASS.inc();
}

pub(crate) fn record_cache_stats(entries: usize, key_locks: usize) {
    URL_CACHE_ENTRIES.record(entries as u64, &[]);
    URL_CACHE_KEY_LOCKS.record(key_locks as u64, &[]);
    PROM_URL_CACHE_ENTRIES.set(entries as i64);
    PROM_URL_CACHE_KEY_LOCKS.set(key_locks as i64);
}
