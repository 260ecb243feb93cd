//! Object keys under which manifests and artifacts are stored.

use crate::digest::ContentDigest;

pub const MANIFEST_CONTENT_TYPE: &str = "application/json";
pub const ARTIFACT_CONTENT_TYPE: &str = "application/octet-stream";

/// `{app_id}/manifest.json`
pub fn manifest_key(app_id: &str) -> String {
    format!("{app_id}/manifest.json")
}

/// `{app_id}/artifact/{checksum}`. Byte-identical artifacts share one key.
pub fn artifact_key(app_id: &str, checksum: &ContentDigest) -> String {
    format!("{app_id}/artifact/{checksum}")
}
