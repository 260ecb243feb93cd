//! Release manifest schema, merge rules, and content addressing for shipyard.
//!
//! This crate defines the pure layer of a publish: the persisted
//! `ReleaseManifest` document (`channel -> platform -> artifact`), the
//! get-or-create path repair and release merge applied to it, BLAKE3 content
//! digests of artifact bytes (`ContentDigest`), and the object keys derived
//! from them. Nothing here performs network I/O.

pub mod digest;
pub mod keys;
pub mod manifest;
pub mod merge;
mod timestamp;

pub use digest::{digest_and_rewind, digest_bytes, digest_reader, ContentDigest, DigestError};
pub use keys::{artifact_key, manifest_key, ARTIFACT_CONTENT_TYPE, MANIFEST_CONTENT_TYPE};
pub use manifest::{ArtifactEntry, ChannelEntry, ManifestError, ReleaseManifest};
pub use merge::ReleaseUpdate;
