//! AWS Signature Version 4 request signing for S3-compatible stores.
//!
//! Implements the client side of the [SigV4 signing process][sigv4-docs]: canonical
//! request, string to sign, derived signing key, and the resulting
//! `Authorization` header. Payloads are always signed with their SHA-256.
//!
//! [sigv4-docs]: https://docs.aws.amazon.com/AmazonS3/latest/API/sig-v4-header-based-auth.html

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// One request as seen by the signer. Header names may be in any case.
pub struct CanonicalInput<'a> {
    pub method: &'a str,
    /// Already URI-encoded absolute path, e.g. `/bucket/app/manifest.json`.
    pub uri: &'a str,
    pub query: &'a str,
    pub headers: &'a [(&'a str, &'a str)],
    /// Hex SHA-256 of the body (see [`payload_hash`]).
    pub payload_hash: &'a str,
}

/// Signs requests for one access key in one region.
pub struct RequestSigner<'a> {
    access_key: &'a str,
    secret_key: &'a str,
    region: &'a str,
}

impl<'a> RequestSigner<'a> {
    pub fn new(access_key: &'a str, secret_key: &'a str, region: &'a str) -> Self {
        Self {
            access_key,
            secret_key,
            region,
        }
    }

    /// Value of the `Authorization` header for `input`, signed at `amz_date`
    /// (the request's `x-amz-date`, `YYYYMMDDTHHMMSSZ`).
    pub fn authorization(&self, input: &CanonicalInput<'_>, amz_date: &str) -> String {
        let date = &amz_date[..8.min(amz_date.len())];
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let (canonical, signed_headers) = build_canonical_request(input);
        let string_to_sign = build_string_to_sign(amz_date, &scope, &canonical);
        let signing_key = derive_signing_key(self.secret_key, date, self.region);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));
        format!(
            "{ALGORITHM} Credential={}/{scope},SignedHeaders={signed_headers},Signature={signature}",
            self.access_key
        )
    }
}

/// `x-amz-date` rendering of `now`.
pub fn amz_date(now: &DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Hex SHA-256 of a request body.
pub fn payload_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Percent-encode per the SigV4 rules: unreserved characters pass through,
/// everything else becomes `%XX`. `/` is kept when `encode_slash` is false.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(b));
            }
            b'/' if !encode_slash => out.push('/'),
            _ => {
                let _ = write!(out, "%{b:02X}");
            }
        }
    }
    out
}

/// Canonical request and its `SignedHeaders` list.
///
/// ```text
/// <HTTPMethod>\n<CanonicalURI>\n<CanonicalQueryString>\n<CanonicalHeaders>\n<SignedHeaders>\n<HashedPayload>
/// ```
fn build_canonical_request(input: &CanonicalInput<'_>) -> (String, String) {
    let canonical_uri = if input.uri.is_empty() { "/" } else { input.uri };

    let mut headers: Vec<(String, &str)> = input
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonical_headers = String::new();
    for (name, value) in &headers {
        canonical_headers.push_str(name);
        canonical_headers.push(':');
        canonical_headers.push_str(value);
        canonical_headers.push('\n');
    }
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        input.method,
        canonical_uri,
        canonical_query_string(input.query),
        canonical_headers,
        signed_headers,
        input.payload_hash
    );
    (canonical, signed_headers)
}

/// Sort query parameters by key for the canonical query string.
fn canonical_query_string(query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect();
    pairs.sort_unstable();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// ```text
/// AWS4-HMAC-SHA256\n<timestamp>\n<scope>\n<hex(SHA256(canonical_request))>
/// ```
fn build_string_to_sign(timestamp: &str, scope: &str, canonical_request: &str) -> String {
    let hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    format!("{ALGORITHM}\n{timestamp}\n{scope}\n{hash}")
}

/// HMAC chain: date, region, service, then `aws4_request`.
fn derive_signing_key(secret: &str, date: &str, region: &str) -> Vec<u8> {
    let key = format!("AWS4{secret}");
    let date_key = hmac_sha256(key.as_bytes(), date.as_bytes());
    let region_key = hmac_sha256(&date_key, region.as_bytes());
    let service_key = hmac_sha256(&region_key, SERVICE.as_bytes());
    hmac_sha256(&service_key, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
