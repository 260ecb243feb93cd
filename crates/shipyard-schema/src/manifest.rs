use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to decode manifest: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode manifest: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}

/// The release manifest shared by every channel and platform of one app.
///
/// Serialized as `{"channel": {<name>: ChannelEntry}}`. Channel keys are never
/// removed by a publish; only the targeted entry is mutated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseManifest {
    #[serde(
        rename = "channel",
        default,
        deserialize_with = "nullable_entries"
    )]
    pub channels: BTreeMap<String, ChannelEntry>,
    /// Keys this schema does not know about, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Release state of one channel. `version` and `build` are channel-wide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default = "crate::timestamp::zero", with = "crate::timestamp")]
    pub build: DateTime<FixedOffset>,
    #[serde(
        rename = "artifact",
        default,
        deserialize_with = "nullable_entries"
    )]
    pub artifacts: BTreeMap<String, ArtifactEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ChannelEntry {
    fn default() -> Self {
        Self {
            version: String::new(),
            build: crate::timestamp::zero(),
            artifacts: BTreeMap::new(),
            extra: Map::new(),
        }
    }
}

/// Where one platform's binary lives and what it hashes to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub binary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub checksum: String,
    /// Locator of a differential update package. Never written by a publish.
    #[serde(default, deserialize_with = "null_as_default")]
    pub patch: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReleaseManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a fetched manifest. An empty (or whitespace-only) body is the
    /// same as no manifest at all.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ManifestError> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        serde_json::from_slice(data).map_err(ManifestError::Decode)
    }

    /// Compact JSON, map keys in sorted order.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        serde_json::to_vec(self).map_err(ManifestError::Encode)
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelEntry> {
        self.channels.get(name)
    }

    pub fn artifact(&self, channel: &str, platform: &str) -> Option<&ArtifactEntry> {
        self.channels.get(channel)?.artifacts.get(platform)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A `null` map becomes empty and `null` entries become zero-valued entries.
fn nullable_entries<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de> + Default,
{
    let raw = Option::<BTreeMap<String, Option<V>>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect())
}
