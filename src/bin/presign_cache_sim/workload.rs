use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Zipf};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum Pattern {
    Uniform,
    Zipf,
    Scan,
}

/// Object key for media index `idx`, spread over a handful of owners the way
/// uploads are laid out (`<owner>/<kind>/<id>.<ext>`).
pub fn index_to_key(idx: usize) -> String {
    let owner = idx % 97;
    if idx % 5 == 0 {
        format!("u{owner}/video/{idx}.mp4")
    } else {
        format!("u{owner}/images/{idx}.png")
    }
}

/// Sequence of media indices to request.
///
/// `fresh_upload_ratio` is the share of requests for objects seen exactly once
/// (e.g. a just-posted image nobody else opens); those indices start past
/// `num_objects`.
pub fn generate_workload(
    pattern: Pattern,
    num_objects: usize,
    num_requests: usize,
    zipf_exponent: f64,
    fresh_upload_ratio: f64,
    seed: u64,
) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut requests = Vec::with_capacity(num_requests);
    let mut fresh_counter = num_objects;

    let zipf_dist = match pattern {
        Pattern::Zipf => {
            Some(Zipf::new(num_objects as f64, zipf_exponent).expect("invalid zipf parameters"))
        }
        Pattern::Uniform | Pattern::Scan => None,
    };

    let mut scan_cursor: usize = 0;

    for _ in 0..num_requests {
        if fresh_upload_ratio > 0.0 && rng.random::<f64>() < fresh_upload_ratio {
            requests.push(fresh_counter);
            fresh_counter += 1;
            continue;
        }

        let idx = match (&zipf_dist, pattern) {
            // Zipf samples fall in [1, num_objects]
            (Some(zipf), _) => (zipf.sample(&mut rng) as usize)
                .saturating_sub(1)
                .min(num_objects - 1),
            (None, Pattern::Scan) => {
                let i = scan_cursor;
                scan_cursor = (scan_cursor + 1) % num_objects;
                i
            }
            (None, _) => rng.random_range(0..num_objects),
        };

        requests.push(idx);
    }

    requests
}
