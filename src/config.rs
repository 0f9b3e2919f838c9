use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
};

/// Longest validity SigV4 allows for a presigned URL (7 days).
pub const MAX_PRESIGN_TTL_SECONDS: u64 = 604_800;

pub struct Config {
    pub r2_account_id: String,
    pub r2_access_key_id: String,
    pub r2_secret_access_key: String,
    pub r2_bucket_name: String,
    pub r2_bucket_public: bool,
    pub r2_endpoint: Option<String>,
    pub r2_public_url: Option<String>,
    pub url_cache_shards: usize,
    pub url_cache_default_ttl_seconds: u64,
    pub otel_grpc_endpoint_url: Option<String>,
    pub prometheus_textfile_dir: Option<String>,
}

impl Config {
    pub fn from_env(vars: &HashMap<String, String>) -> Self {
        let config = Self {
            r2_account_id: vars
                .get("R2_ACCOUNT_ID")
                .cloned()
                .expect("R2_ACCOUNT_ID is required"),
            r2_access_key_id: vars
                .get("R2_ACCESS_KEY_ID")
                .cloned()
                .expect("R2_ACCESS_KEY_ID is required"),
            r2_secret_access_key: vars
                .get("R2_SECRET_ACCESS_KEY")
                .cloned()
                .expect("R2_SECRET_ACCESS_KEY is required"),
            r2_bucket_name: vars
                .get("R2_BUCKET_NAME")
                .cloned()
                .expect("R2_BUCKET_NAME is required"),
            r2_bucket_public: vars
                .get("R2_BUCKET_PUBLIC")
                .map(|s| s.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            r2_endpoint: vars.get("R2_ENDPOINT").cloned(),
            r2_public_url: vars.get("R2_PUBLIC_URL").cloned(),
            url_cache_shards: vars
                .get("URL_CACHE_SHARDS")
                .map(|s| s.parse().expect("invalid URL_CACHE_SHARDS"))
                .unwrap_or(16),
            url_cache_default_ttl_seconds: vars
                .get("URL_CACHE_DEFAULT_TTL_SECONDS")
                .map(|s| s.parse().expect("invalid URL_CACHE_DEFAULT_TTL_SECONDS"))
                .unwrap_or(3600),
            otel_grpc_endpoint_url: vars.get("OTEL_GRPC_ENDPOINT_URL").cloned(),
            prometheus_textfile_dir: vars.get("PROMETHEUS_TEXTFILE_DIR").cloned(),
        };

        config.validate();
        config
    }

    fn validate(&self) {
        if self.url_cache_shards == 0 {
            panic!("Invalid configuration: url_cache_shards must be greater than 0");
        }

        if self.url_cache_default_ttl_seconds == 0 {
            panic!("Invalid configuration: url_cache_default_ttl_seconds must be greater than 0");
        }

        if self.url_cache_default_ttl_seconds > MAX_PRESIGN_TTL_SECONDS {
            panic!(
                "Invalid configuration: url_cache_default_ttl_seconds ({}) must be <= {}",
                self.url_cache_default_ttl_seconds, MAX_PRESIGN_TTL_SECONDS
            );
        }

        if self.r2_bucket_name.is_empty() {
            panic!("Invalid configuration: r2_bucket_name must not be empty");
        }
    }

    /// S3-compatible API endpoint of the account.
    pub fn endpoint(&self) -> String {
        match &self.r2_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.r2.cloudflarestorage.com", self.r2_account_id),
        }
    }

    /// Base of the unsigned URLs handed out when the bucket is public.
    pub fn public_base_url(&self) -> String {
        match &self.r2_public_url {
            Some(public_url) => public_url.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.{}.r2.dev",
                self.r2_bucket_name, self.r2_account_id
            ),
        }
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Config{{ endpoint: {}, bucket: {}, bucket_public: {}, public_base_url: {}, \
             url_cache_shards: {}, url_cache_default_ttl_seconds: {}, \
             otel_grpc_endpoint_url: {:?}, prometheus_textfile_dir: {:?} }}",
            self.endpoint(),
            self.r2_bucket_name,
            self.r2_bucket_public,
            self.public_base_url(),
            self.url_cache_shards,
            self.url_cache_default_ttl_seconds,
            self.otel_grpc_endpoint_url,
            self.prometheus_textfile_dir,
        )
    }
}
