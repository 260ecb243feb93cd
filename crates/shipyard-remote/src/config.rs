use crate::RemoteError;
use std::fmt;

/// Region name Cloudflare R2 expects in signed requests.
pub const R2_REGION: &str = "auto";

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Scheme and authority, e.g. `https://<account>.r2.cloudflarestorage.com`.
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl RemoteConfig {
    pub fn new(endpoint: &str, bucket: &str, access_key: &str, secret_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            bucket: bucket.to_owned(),
            region: R2_REGION.to_owned(),
            access_key: access_key.to_owned(),
            secret_key: secret_key.to_owned(),
        }
    }

    /// Cloudflare R2 endpoint for the given account.
    pub fn for_r2(account_id: &str, bucket: &str, access_key: &str, secret_key: &str) -> Self {
        Self::new(
            &format!("https://{account_id}.r2.cloudflarestorage.com"),
            bucket,
            access_key,
            secret_key,
        )
    }

    #[must_use]
    pub fn with_region(mut self, region: &str) -> Self {
        region.clone_into(&mut self.region);
        self
    }

    /// `host[:port]` of the endpoint, as sent in the `Host` header.
    pub fn host(&self) -> Result<&str, RemoteError> {
        let rest = self
            .endpoint
            .strip_prefix("https://")
            .or_else(|| self.endpoint.strip_prefix("http://"))
            .ok_or_else(|| {
                RemoteError::Config(format!(
                    "endpoint must start with http:// or https://: '{}'",
                    self.endpoint
                ))
            })?;
        let host = rest.split('/').next().unwrap_or_default();
        if host.is_empty() {
            return Err(RemoteError::Config(format!(
                "endpoint has no host: '{}'",
                self.endpoint
            )));
        }
        Ok(host)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
