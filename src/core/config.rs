use config::{Config, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::utils::auth;

pub(crate) const ENV_PREFIX: &str = "DONACORE";

#[derive(Debug, Deserialize, Clone)]
pub struct Args {
    pub api_url: String,
    pub timeout_ms: u64,
    pub refresh_timeout_ms: u64,
    pub expiry_margin_secs: i64,
    pub access_keys: String,
    pub refresh_keys: String,
    pub public_routes: String,
    pub login_path: String,
    pub storage_path: String,
    pub location: String,
    pub log_level: String,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5055/api".into(),
            timeout_ms: 10_000,
            refresh_timeout_ms: 10_000,
            expiry_margin_secs: auth::DEFAULT_EXPIRY_MARGIN_SECS,
            access_keys: "access,accessToken,access_token,jwt,token".into(),
            refresh_keys: "refresh,refreshToken,refresh_token".into(),
            public_routes: "=/,/explore,/p/,/a/,/auth/".into(),
            login_path: "/auth/login".into(),
            storage_path: ".donacore/storage.json".into(),
            location: "/app".into(),
            log_level: "info".into(),
        }
    }
}

impl Args {
    /// Reads `DONACORE_*` environment variables on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Args::default();

        let config = Config::builder()
            .set_default("api_url", defaults.api_url)?
            .set_default("timeout_ms", defaults.timeout_ms)?
            .set_default("refresh_timeout_ms", defaults.refresh_timeout_ms)?
            .set_default("expiry_margin_secs", defaults.expiry_margin_secs)?
            .set_default("access_keys", defaults.access_keys)?
            .set_default("refresh_keys", defaults.refresh_keys)?
            .set_default("public_routes", defaults.public_routes)?
            .set_default("login_path", defaults.login_path)?
            .set_default("storage_path", defaults.storage_path)?
            .set_default("location", defaults.location)?
            .set_default("log_level", defaults.log_level)?
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .map_err(ConfigError::Config)?;

        let mut args = config.try_deserialize::<Args>().map_err(ConfigError::Config)?;
        args.api_url = normalize_base_url(&args.api_url)?;

        Ok(args)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn access_aliases(&self) -> Vec<String> {
        split_list(&self.access_keys)
    }

    pub fn refresh_aliases(&self) -> Vec<String> {
        split_list(&self.refresh_keys)
    }

    pub fn storage_path(&self) -> PathBuf {
        PathBuf::from(&self.storage_path)
    }
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');

    let Some((scheme, remainder)) = trimmed.split_once("://") else {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    };

    if !matches!(scheme, "http" | "https") || remainder.is_empty() || remainder.starts_with('/') {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }

    Ok(trimmed.to_string())
}
