//! Process configuration, read once at startup.
//!
//! Every required value comes from an environment variable. The loader takes
//! a lookup function so the rest of the crate never reads process state.

use shipyard_remote::RemoteConfig;
use std::path::PathBuf;
use thiserror::Error;

pub const ACCOUNT_ID: &str = "ACCOUNT_ID";
pub const ACCESS_KEY: &str = "ACCESS_KEY";
pub const ACCESS_SECRET: &str = "ACCESS_SECRET";
pub const BUCKET: &str = "BUCKET";
pub const CHANNEL: &str = "CHANNEL";
pub const APP_ID: &str = "APP_ID";
pub const VERSION: &str = "VERSION";
pub const PLATFORM: &str = "PLATFORM";
pub const EXECUTABLE_PATH: &str = "EXECUTABLE_PATH";
/// Optional: any S3-compatible endpoint instead of the account's R2 endpoint.
pub const ENDPOINT_URL: &str = "ENDPOINT_URL";
/// Optional: signing region, `auto` when unset.
pub const REGION: &str = "REGION";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} is set but empty")]
    Empty(&'static str),
}

/// The `(app, channel, platform)` slot a publish writes, and the version
/// recorded for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub app_id: String,
    pub channel: String,
    pub platform: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub remote: RemoteConfig,
    pub target: ReleaseTarget,
    pub artifact_path: PathBuf,
}

impl PublishConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from `lookup`. Required values are checked in
    /// a fixed order and the first missing one is reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| match lookup(name) {
            None => Err(ConfigError::Missing(name)),
            Some(v) if v.is_empty() => Err(ConfigError::Empty(name)),
            Some(v) => Ok(v),
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let account_id = required(ACCOUNT_ID)?;
        let access_key = required(ACCESS_KEY)?;
        let secret_key = required(ACCESS_SECRET)?;
        let bucket = required(BUCKET)?;
        let channel = required(CHANNEL)?;
        let app_id = required(APP_ID)?;
        let version = required(VERSION)?;
        let platform = required(PLATFORM)?;
        let artifact_path = PathBuf::from(required(EXECUTABLE_PATH)?);

        let mut remote = match optional(ENDPOINT_URL) {
            Some(endpoint) => RemoteConfig::new(&endpoint, &bucket, &access_key, &secret_key),
            None => RemoteConfig::for_r2(&account_id, &bucket, &access_key, &secret_key),
        };
        if let Some(region) = optional(REGION) {
            remote = remote.with_region(&region);
        }

        Ok(Self {
            remote,
            target: ReleaseTarget {
                app_id,
                channel,
                platform,
                version,
            },
            artifact_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const REQUIRED: [&str; 9] = [
        ACCOUNT_ID,
        ACCESS_KEY,
        ACCESS_SECRET,
        BUCKET,
        CHANNEL,
        APP_ID,
        VERSION,
        PLATFORM,
        EXECUTABLE_PATH,
    ];

    fn full_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (ACCOUNT_ID, "acct".to_owned()),
            (ACCESS_KEY, "ak".to_owned()),
            (ACCESS_SECRET, "sk".to_owned()),
            (BUCKET, "releases".to_owned()),
            (CHANNEL, "stable".to_owned()),
            (APP_ID, "app1".to_owned()),
            (VERSION, "1.0.0".to_owned()),
            (PLATFORM, "linux-x64".to_owned()),
            (EXECUTABLE_PATH, "/tmp/app".to_owned()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<PublishConfig, ConfigError> {
        PublishConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn loads_complete_environment() {
        let config = load(&full_env()).unwrap();
        assert_eq!(
            config.remote.endpoint,
            "https://acct.r2.cloudflarestorage.com"
        );
        assert_eq!(config.remote.bucket, "releases");
        assert_eq!(config.remote.access_key, "ak");
        assert_eq!(config.remote.secret_key, "sk");
        assert_eq!(config.remote.region, "auto");
        assert_eq!(
            config.target,
            ReleaseTarget {
                app_id: "app1".to_owned(),
                channel: "stable".to_owned(),
                platform: "linux-x64".to_owned(),
                version: "1.0.0".to_owned(),
            }
        );
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/app"));
    }

    #[test]
    fn each_missing_value_has_its_own_error() {
        for name in REQUIRED {
            let mut env = full_env();
            env.remove(name);
            let err = load(&env).unwrap_err();
            assert_eq!(err, ConfigError::Missing(name));
            assert_eq!(err.to_string(), format!("{name} is not set"));
        }
    }

    #[test]
    fn first_missing_value_wins() {
        let mut env = full_env();
        env.remove(BUCKET);
        env.remove(PLATFORM);
        assert_eq!(load(&env).unwrap_err(), ConfigError::Missing(BUCKET));
    }

    #[test]
    fn empty_value_is_rejected() {
        let mut env = full_env();
        env.insert(CHANNEL, String::new());
        let err = load(&env).unwrap_err();
        assert_eq!(err, ConfigError::Empty(CHANNEL));
        assert_eq!(err.to_string(), "CHANNEL is set but empty");
    }

    #[test]
    fn endpoint_and_region_overrides() {
        let mut env = full_env();
        env.insert(ENDPOINT_URL, "http://127.0.0.1:9000/".to_owned());
        env.insert(REGION, "us-east-1".to_owned());
        let config = load(&env).unwrap();
        assert_eq!(config.remote.endpoint, "http://127.0.0.1:9000");
        assert_eq!(config.remote.region, "us-east-1");
    }

    #[test]
    fn empty_optional_values_are_ignored() {
        let mut env = full_env();
        env.insert(ENDPOINT_URL, String::new());
        env.insert(REGION, String::new());
        let config = load(&env).unwrap();
        assert_eq!(
            config.remote.endpoint,
            "https://acct.r2.cloudflarestorage.com"
        );
        assert_eq!(config.remote.region, "auto");
    }
}
