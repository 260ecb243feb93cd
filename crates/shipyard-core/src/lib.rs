//! Publish pipeline for shipyard.
//!
//! This crate ties the manifest schema and the storage backends together into
//! the `Publisher`: fetch the current release manifest, digest the artifact,
//! merge the release record, then upload the artifact and the manifest in that
//! order. It also loads the process configuration (`PublishConfig`) and owns
//! the interrupt flag checked before each remote write.

pub mod config;
pub mod publish;
pub mod signal;

pub use config::{ConfigError, PublishConfig, ReleaseTarget};
pub use publish::{ArtifactSource, PublishReport, Publisher, Uploaded};
pub use signal::{install_signal_handler, shutdown_flag, shutdown_requested};

use shipyard_remote::RemoteError;
use shipyard_schema::{DigestError, ManifestError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to {context} '{}': {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("checksum error: {0}")]
    Digest(#[from] DigestError),
    #[error("failed to fetch manifest '{key}': {source}")]
    ManifestFetch {
        key: String,
        #[source]
        source: RemoteError,
    },
    #[error("manifest error: '{key}': {source}")]
    ManifestDecode {
        key: String,
        #[source]
        source: ManifestError,
    },
    #[error("invalid release target: {0}")]
    InvalidTarget(#[source] ManifestError),
    #[error("manifest error: {0}")]
    Serialization(#[source] ManifestError),
    #[error("failed to upload artifact '{key}': {source}")]
    ArtifactUpload {
        key: String,
        #[source]
        source: RemoteError,
    },
    #[error("failed to upload manifest '{key}': {source}")]
    ManifestUpload {
        key: String,
        #[source]
        source: RemoteError,
    },
    #[error("interrupted before {0}")]
    Interrupted(&'static str),
}
