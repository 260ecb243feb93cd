use crate::sigv4::{amz_date, payload_hash, uri_encode, CanonicalInput, RequestSigner};
use crate::{RemoteConfig, RemoteError, StorageBackend};
use std::io::Read;

/// S3-compatible object store backend (Cloudflare R2, MinIO, AWS S3).
///
/// Uses path-style addressing and signs every request with SigV4:
/// - `PUT {endpoint}/{bucket}/{key}`: upload, replacing the whole object
/// - `GET {endpoint}/{bucket}/{key}`: download, 404 means absent
pub struct S3Backend {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl S3Backend {
    pub fn new(config: RemoteConfig) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self { config, agent }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Encoded request path for `key`.
    fn object_path(&self, key: &str) -> String {
        format!(
            "/{}/{}",
            uri_encode(&self.config.bucket, true),
            uri_encode(key, false)
        )
    }

    fn signed_headers(
        &self,
        method: &str,
        path: &str,
        payload_sha256: &str,
        content_type: Option<&str>,
    ) -> Result<Vec<(&'static str, String)>, RemoteError> {
        let host = self.config.host()?;
        let date = amz_date(&chrono::Utc::now());

        let mut headers: Vec<(&str, &str)> = vec![
            ("host", host),
            ("x-amz-content-sha256", payload_sha256),
            ("x-amz-date", date.as_str()),
        ];
        if let Some(ct) = content_type {
            headers.push(("content-type", ct));
        }

        let signer = RequestSigner::new(
            &self.config.access_key,
            &self.config.secret_key,
            &self.config.region,
        );
        let authorization = signer.authorization(
            &CanonicalInput {
                method,
                uri: path,
                query: "",
                headers: &headers,
                payload_hash: payload_sha256,
            },
            &date,
        );

        let mut out = vec![
            ("x-amz-content-sha256", payload_sha256.to_owned()),
            ("x-amz-date", date.clone()),
            ("Authorization", authorization),
        ];
        if let Some(ct) = content_type {
            out.push(("Content-Type", ct.to_owned()));
        }
        Ok(out)
    }

    fn do_put(&self, key: &str, content_type: &str, data: &[u8]) -> Result<(), RemoteError> {
        let path = self.object_path(key);
        let url = format!("{}{path}", self.config.endpoint);
        let headers = self.signed_headers("PUT", &path, &payload_hash(data), Some(content_type))?;

        let mut req = self.agent.put(&url);
        for (name, value) in &headers {
            req = req.header(*name, value.as_str());
        }
        match req.send(data) {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(code)) => {
                Err(RemoteError::Http(format!("HTTP {code} for PUT {url}")))
            }
            Err(e) => Err(RemoteError::Http(e.to_string())),
        }
    }

    fn do_get(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        let path = self.object_path(key);
        let url = format!("{}{path}", self.config.endpoint);
        let headers = self.signed_headers("GET", &path, &payload_hash(b""), None)?;

        let mut req = self.agent.get(&url);
        for (name, value) in &headers {
            req = req.header(*name, value.as_str());
        }
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RemoteError::NotFound(key.to_owned()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Http(format!("HTTP {code} for GET {url}")));
            }
            Err(e) => {
                return Err(RemoteError::Http(e.to_string()));
            }
        };

        let code = resp.status().as_u16();
        if code == 404 {
            return Err(RemoteError::NotFound(key.to_owned()));
        }
        if code >= 400 {
            return Err(RemoteError::Http(format!("HTTP {code} for GET {url}")));
        }

        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(body)
    }
}

impl StorageBackend for S3Backend {
    fn get_object(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        tracing::debug!("GET {}/{key}", self.config.bucket);
        self.do_get(key)
    }

    fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), RemoteError> {
        tracing::debug!("PUT {}/{key} ({} bytes)", self.config.bucket, data.len());
        self.do_put(key, content_type, data)
    }
}
