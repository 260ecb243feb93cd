//! Path repair and release merge for [`ReleaseManifest`].
//!
//! A publish touches exactly one `(channel, platform)` pair. The path to it is
//! created on demand, and every sibling channel and platform is left exactly
//! as it was fetched.

use crate::digest::ContentDigest;
use crate::keys::artifact_key;
use crate::manifest::{ArtifactEntry, ChannelEntry, ManifestError, ReleaseManifest};
use chrono::{DateTime, FixedOffset};

/// One release record to apply to a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseUpdate {
    /// Namespace of the artifact key, normally the app id.
    pub app_id: String,
    pub channel: String,
    pub platform: String,
    pub version: String,
    /// Last modification time of the artifact.
    pub build: DateTime<FixedOffset>,
    pub checksum: ContentDigest,
}

impl ReleaseUpdate {
    /// Storage key the artifact bytes are uploaded under.
    pub fn artifact_key(&self) -> String {
        artifact_key(&self.app_id, &self.checksum)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.app_id.is_empty() {
            return Err(ManifestError::EmptyField("app id"));
        }
        if self.channel.is_empty() {
            return Err(ManifestError::EmptyField("channel"));
        }
        if self.platform.is_empty() {
            return Err(ManifestError::EmptyField("platform"));
        }
        Ok(())
    }
}

impl ReleaseManifest {
    /// Get or create `channels[channel]`.
    pub fn ensure_channel(&mut self, channel: &str) -> &mut ChannelEntry {
        self.channels.entry(channel.to_owned()).or_default()
    }

    /// Get or create `channels[channel].artifacts[platform]`, creating the
    /// channel first if needed. Existing entries are returned unchanged.
    pub fn ensure_artifact(&mut self, channel: &str, platform: &str) -> &mut ArtifactEntry {
        self.ensure_channel(channel)
            .artifacts
            .entry(platform.to_owned())
            .or_default()
    }

    /// Apply `update` to its `(channel, platform)` pair.
    ///
    /// Sets the channel's `version` and `build`, and the platform's `checksum`
    /// and content-addressed `binary` key. `patch` and all other entries are
    /// not touched.
    pub fn apply(&mut self, update: &ReleaseUpdate) -> Result<(), ManifestError> {
        update.validate()?;
        let binary = update.artifact_key();

        let channel = self.ensure_channel(&update.channel);
        channel.version.clone_from(&update.version);
        channel.build = update.build;

        let artifact = self.ensure_artifact(&update.channel, &update.platform);
        artifact.checksum = update.checksum.to_string();
        artifact.binary = binary;
        Ok(())
    }
}
