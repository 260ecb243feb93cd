pub mod publish;

use shipyard_core::CoreError;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_ARTIFACT_ERROR: u8 = 3;
pub const EXIT_MANIFEST_ERROR: u8 = 4;
pub const EXIT_REMOTE_ERROR: u8 = 5;
pub const EXIT_INTERRUPTED: u8 = 130;

pub fn exit_code(err: &CoreError) -> u8 {
    match err {
        CoreError::Config(_) => EXIT_CONFIG_ERROR,
        CoreError::Io { .. } | CoreError::Digest(_) => EXIT_ARTIFACT_ERROR,
        CoreError::ManifestDecode { .. }
        | CoreError::Serialization(_)
        | CoreError::InvalidTarget(_) => EXIT_MANIFEST_ERROR,
        CoreError::ManifestFetch { .. }
        | CoreError::ArtifactUpload { .. }
        | CoreError::ManifestUpload { .. } => EXIT_REMOTE_ERROR,
        CoreError::Interrupted(_) => EXIT_INTERRUPTED,
    }
}
