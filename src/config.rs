use std::path::{Path, PathBuf};

use reqwest::Url;
use thiserror::Error;

use crate::security::crypto::CipherVariant;
use crate::security::keyset::Keyset;

pub const BASE_URL_ENV: &str = "ZO_BASE_URL";
pub const ROOT_USER_EMAIL_ENV: &str = "ZO_ROOT_USER_EMAIL";
pub const ROOT_USER_PASSWORD_ENV: &str = "ZO_ROOT_USER_PASSWORD";
pub const ORG_ENV: &str = "ZO_ORG";
pub const STREAM_ENV: &str = "ZO_STREAM";
pub const CIPHER_KEY_TYPE_ENV: &str = "ZO_CIPHER_KEY_TYPE";
pub const CIPHER_KEYSET_ENV: &str = "ZO_CIPHER_KEYSET";
pub const LOGS_FIXTURE_ENV: &str = "ZO_LOGS_FIXTURE";

pub const DEFAULT_ORG: &str = "default";
pub const DEFAULT_STREAM: &str = "default";
pub const DEFAULT_LOGS_FIXTURE: &str = "test-data/logs_data.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
    #[error("{} and {} must be set together", ROOT_USER_EMAIL_ENV, ROOT_USER_PASSWORD_ENV)]
    PartialCredentials,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a probe needs to know about the service under test.
///
/// Built once per test from the environment and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub base_url: Url,
    pub org: String,
    pub stream: String,
    pub credentials: Option<Credentials>,
    pub variant: CipherVariant,
    pub keyset: Keyset,
    pub fixture_path: PathBuf,
}

impl HarnessConfig {
    pub fn from_env() -> anyhow::Result<HarnessConfig> {
        HarnessConfig::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, treating empty values as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<HarnessConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = var(BASE_URL_ENV).ok_or(ConfigError::Missing(BASE_URL_ENV))?;
        let base_url = parse_base_url(BASE_URL_ENV, &base_url)?;

        let credentials = match (var(ROOT_USER_EMAIL_ENV), var(ROOT_USER_PASSWORD_ENV)) {
            (Some(user), Some(password)) => Some(Credentials { user, password }),
            (None, None) => None,
            _ => return Err(ConfigError::PartialCredentials.into()),
        };

        let variant = match var(CIPHER_KEY_TYPE_ENV) {
            Some(value) => value.parse()?,
            None => CipherVariant::default(),
        };

        let keyset = match var(CIPHER_KEYSET_ENV) {
            Some(json) => Keyset::from_json(&json)?,
            None => Keyset::embedded()?,
        };

        let fixture_path = var(LOGS_FIXTURE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_fixture_path);

        Ok(HarnessConfig {
            base_url,
            org: var(ORG_ENV).unwrap_or_else(|| DEFAULT_ORG.into()),
            stream: var(STREAM_ENV).unwrap_or_else(|| DEFAULT_STREAM.into()),
            credentials,
            variant,
            keyset,
            fixture_path,
        })
    }
}

pub fn default_fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_LOGS_FIXTURE)
}

/// Paths are joined onto the base URL, so it must end with a slash to keep its last segment.
pub fn parse_base_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let mut value = value.trim().to_string();
    if !value.ends_with('/') {
        value.push('/');
    }

    let url = Url::parse(&value).map_err(|err| ConfigError::InvalidUrl {
        name,
        reason: err.to_string(),
    })?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            name,
            reason: format!("{url} is not an http(s) base URL"),
        });
    }

    Ok(url)
}
