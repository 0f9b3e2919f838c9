mod report;
mod simulated_signer;
mod workload;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;

use presign_cache::{SignedUrlCache, Signer};

use report::ServedBreakdown;
use simulated_signer::SimulatedSigner;
use workload::Pattern;

#[derive(Parser, Debug)]
#[command(
    name = "presign_cache_sim",
    about = "Presigned URL cache load simulator"
)]
struct Args {
    /// Number of distinct media objects
    #[arg(long, default_value_t = 10_000)]
    num_objects: usize,

    /// Latency of a single signing call (ms)
    #[arg(long, default_value_t = 20)]
    latency_ms: u64,

    /// Fraction of signing calls that fail [0.0, 1.0)
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,

    /// Requested URL validity in seconds
    #[arg(long, default_value_t = 3600)]
    ttl_secs: u64,

    /// Number of cache shards
    #[arg(long, default_value_t = 16)]
    cache_shards: usize,

    /// Access pattern
    #[arg(long, value_enum, default_value_t = Pattern::Zipf)]
    pattern: Pattern,

    /// Zipf skew parameter
    #[arg(long, default_value_t = 1.0)]
    zipf_exponent: f64,

    /// Fraction of requests to objects seen exactly once [0.0, 1.0)
    #[arg(long, default_value_t = 0.0)]
    fresh_upload_ratio: f64,

    /// Total requests to issue
    #[arg(long, default_value_t = 100_000)]
    num_requests: usize,

    /// Parallel tokio tasks
    #[arg(long, default_value_t = 64)]
    concurrency: usize,

    /// Print progress every N requests (0 = off)
    #[arg(long, default_value_t = 10_000)]
    progress_interval: usize,

    /// Call the signer for every request instead of going through the cache
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Treat the bucket as public (no signing at all)
    #[arg(long, default_value_t = false)]
    public: bool,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.concurrency == 0 || args.cache_shards == 0 || args.num_objects == 0 {
        eprintln!("--concurrency, --cache-shards and --num-objects must be greater than 0");
        std::process::exit(2);
    }

    let signer = SimulatedSigner::new(
        Duration::from_millis(args.latency_ms),
        args.failure_rate,
        args.public,
    );
    let ttl = Duration::from_secs(args.ttl_secs);

    let cache = (!args.no_cache).then(|| {
        Arc::new(SignedUrlCache::new(
            signer.clone(),
            args.cache_shards,
            ttl,
        ))
    });

    let workload = workload::generate_workload(
        args.pattern,
        args.num_objects,
        args.num_requests,
        args.zipf_exponent,
        args.fresh_upload_ratio,
        args.seed,
    );

    eprintln!("=== Presigned URL Cache Simulation ===");
    eprintln!("Objects: {}", args.num_objects);
    if args.no_cache {
        eprintln!("Cache: disabled (--no-cache)");
    } else {
        eprintln!("Cache: TTL={}s, {} shards", args.ttl_secs, args.cache_shards);
    }
    eprintln!(
        "Workload: {:?} (s={}), {} requests, concurrency={}",
        args.pattern, args.zipf_exponent, args.num_requests, args.concurrency
    );
    eprintln!(
        "Signer: latency={}ms, failure_rate={:.1}%, public={}",
        args.latency_ms,
        args.failure_rate * 100.0,
        args.public
    );
    if args.fresh_upload_ratio > 0.0 {
        eprintln!(
            "Fresh upload ratio: {:.1}%",
            args.fresh_upload_ratio * 100.0
        );
    }
    eprintln!();

    // Partition workload across tasks
    let chunk_size = workload.len().div_ceil(args.concurrency).max(1);
    let chunks: Vec<Vec<usize>> = workload
        .chunks(chunk_size)
        .map(|c| c.to_vec())
        .collect();

    let completed = Arc::new(AtomicU64::new(0));
    let errors = Arc::new(AtomicU64::new(0));
    let progress_interval = args.progress_interval;
    let total_requests = args.num_requests;

    let start = Instant::now();

    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let cache = cache.clone();
        let signer = signer.clone();
        let completed = completed.clone();
        let errors = errors.clone();

        handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(chunk.len());

            for idx in chunk {
                let key = workload::index_to_key(idx);

                let req_start = Instant::now();
                let result = match &cache {
                    Some(cache) => cache.get_url_with_ttl(&key, ttl).await,
                    None if signer.is_public() => Ok(signer.public_url(&key)),
                    None => signer.sign(&key, ttl).await,
                };
                latencies.push(req_start.elapsed());

                if result.is_err() {
                    errors.fetch_add(1, Ordering::Relaxed);
                }

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if progress_interval > 0 && done % (progress_interval as u64) == 0 {
                    let wall = start.elapsed().as_secs_f64();
                    let rps = done as f64 / wall;
                    eprintln!("[{wall:.1}s] {done}/{total_requests} requests ({rps:.0} req/s)");
                }
            }

            latencies
        }));
    }

    let mut all_latencies: Vec<Duration> = Vec::with_capacity(total_requests);
    for handle in handles {
        match handle.await {
            Ok(latencies) => all_latencies.extend(latencies),
            Err(join_error) => {
                eprintln!("Simulation task failed: {join_error}");
                std::process::exit(1);
            }
        }
    }

    let total_duration = start.elapsed();
    let total_errors = errors.load(Ordering::Relaxed);
    let sign_calls = signer.sign_count();
    let total = all_latencies.len() as u64;
    let unique_keys: HashSet<usize> = workload.iter().copied().collect();

    let served = ServedBreakdown::new(total, total_errors, signer.signed_count(), args.public);
    let hit_rate = served.hit_rate(total);

    all_latencies.sort();
    let p50 = percentile(&all_latencies, 50.0);
    let p99 = percentile(&all_latencies, 99.0);
    let mean = if all_latencies.is_empty() {
        Duration::ZERO
    } else {
        all_latencies.iter().sum::<Duration>() / all_latencies.len() as u32
    };

    let throughput = if total_duration.as_secs_f64() > 0.0 {
        total as f64 / total_duration.as_secs_f64()
    } else {
        0.0
    };

    eprintln!();
    eprintln!("=== Results ===");
    eprintln!("Total requests:  {total}");
    eprintln!("Unique keys:     {}", unique_keys.len());
    eprintln!("Signer calls:    {sign_calls}");
    if args.public {
        eprintln!("Served public:   {}", served.public);
    } else {
        eprintln!("Served signed:   {}", served.signed);
        eprintln!("Served cached:   {} ({hit_rate:.1}%)", served.cached);
    }
    eprintln!("Errors:          {}", served.failed);
    eprintln!("Duration:        {:.2}s", total_duration.as_secs_f64());
    eprintln!("Throughput:      {throughput:.0} req/s");
    eprintln!("Latency p50:     {:.2}ms", p50.as_secs_f64() * 1000.0);
    eprintln!("Latency p99:     {:.2}ms", p99.as_secs_f64() * 1000.0);
    eprintln!("Latency mean:    {:.2}ms", mean.as_secs_f64() * 1000.0);

    if let Some(cache) = &cache {
        let stats = cache.statistics().await;

        eprintln!();
        eprintln!("=== Cache ===");
        eprintln!("Entries:         {}", stats.entries);
        eprintln!("Key locks:       {}", stats.key_locks);
        if !args.public && total_errors == 0 {
            // Every distinct key needs one signature as long as ttl outlives the run.
            eprintln!(
                "Redundant signs: {}",
                sign_calls.saturating_sub(unique_keys.len() as u64)
            );
        }
    }
}

fn percentile(sorted: &[Duration], pct: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
