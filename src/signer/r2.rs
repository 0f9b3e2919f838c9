use std::time::Duration;

use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use tracing::info;

use super::{Signer, SignerError};
use crate::Config;

/// R2 accepts any region name for SigV4; `auto` is the documented one.
const R2_REGION: &str = "auto";

/// Presigns `GetObject` requests against a Cloudflare R2 bucket through its
/// S3-compatible API.
pub struct R2Signer {
    client: aws_sdk_s3::Client,
    bucket: String,
    public: bool,
    public_base_url: String,
}

impl R2Signer {
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: String,
        public: bool,
        public_base_url: String,
    ) -> Self {
        Self {
            client,
            bucket,
            public,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build the S3 client from the configured R2 account and static credentials.
    pub async fn connect(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.r2_access_key_id,
            &config.r2_secret_access_key,
            None,
            None,
            "r2-static",
        );

        let endpoint = config.endpoint();

        let sdk_config = aws_config::from_env()
            .endpoint_url(&endpoint)
            .region(aws_sdk_s3::config::Region::new(R2_REGION))
            .credentials_provider(credentials)
            .load()
            .await;

        let client = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build(),
        );

        info!(
            endpoint = %endpoint,
            bucket = %config.r2_bucket_name,
            public = config.r2_bucket_public,
            "R2 signer configured"
        );

        Self::new(
            client,
            config.r2_bucket_name.clone(),
            config.r2_bucket_public,
            config.public_base_url(),
        )
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait::async_trait]
impl Signer for R2Signer {
    async fn sign(&self, object_key: &str, ttl: Duration) -> Result<String, SignerError> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|err| {
            SignerError::with_source(format!("invalid presign expiry {ttl:?}"), err)
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key)
            .presigned(presigning)
            .await
            .map_err(|err| {
                SignerError::with_source(format!("failed to presign GET for {object_key}"), err)
            })?;

        Ok(request.uri().to_string())
    }

    fn is_public(&self) -> bool {
        self.public
    }

    fn public_url(&self, object_key: &str) -> String {
        format!("{}/{}", self.public_base_url, object_key)
    }
}
