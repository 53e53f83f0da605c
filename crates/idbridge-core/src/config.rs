//! Client configuration.
//!
//! `ClientConfig` is what `AuthenticationClient::new` consumes. `Settings`
//! is its serialisable subset, loaded from
//! `~/.config/idbridge/config.json` and overridable from `IDBRIDGE_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::session::Session;

/// Application name used for the config directory path
const APP_NAME: &str = "idbridge";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_IDENTITY_POOL_ID: &str = "IDBRIDGE_IDENTITY_POOL_ID";
const ENV_AUTH_ROLE_ARN: &str = "IDBRIDGE_AUTH_ROLE_ARN";
const ENV_PROVIDER_ENDPOINT: &str = "IDBRIDGE_PROVIDER_ENDPOINT";
const ENV_EMIT_READY_EVENT: &str = "IDBRIDGE_EMIT_READY_EVENT";
const ENV_CONFIRMED_AUTH_EVENTS_ONLY: &str = "IDBRIDGE_CONFIRMED_AUTH_EVENTS_ONLY";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub identity_pool_id: String,
    pub auth_role_arn: String,
    /// Login-map slot this client manages, e.g. the OpenID issuer domain
    pub provider_endpoint: String,
    /// Token seeded into the login map before any broker call
    pub existing_auth_token: Option<String>,
    pub session: Option<Arc<Session>>,
    pub emit_ready_event: bool,
    /// Suppress authenticated/deauthenticated events until the first
    /// broker round-trip of `init()` has completed
    pub confirmed_auth_events_only: bool,
    /// Install the client's broker handle and region as process-wide SDK
    /// defaults on construction (see `crate::sdk`)
    pub configure_sdk_defaults: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            identity_pool_id: String::new(),
            auth_role_arn: String::new(),
            provider_endpoint: String::new(),
            existing_auth_token: None,
            session: None,
            emit_ready_event: false,
            confirmed_auth_events_only: false,
            configure_sdk_defaults: true,
        }
    }
}

impl ClientConfig {
    pub fn new(
        identity_pool_id: impl Into<String>,
        auth_role_arn: impl Into<String>,
        provider_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            identity_pool_id: identity_pool_id.into(),
            auth_role_arn: auth_role_arn.into(),
            provider_endpoint: provider_endpoint.into(),
            ..Self::default()
        }
    }

    /// Check that every required identifier is present. Blank strings
    /// count as missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("identity_pool_id", &self.identity_pool_id),
            ("auth_role_arn", &self.auth_role_arn),
            ("provider_endpoint", &self.provider_endpoint),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub identity_pool_id: Option<String>,
    pub auth_role_arn: Option<String>,
    pub provider_endpoint: Option<String>,
    pub emit_ready_event: bool,
    pub confirmed_auth_events_only: bool,
}

impl Settings {
    /// Load from the default location, or defaults when no file exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override fields from `lookup`, which maps variable names to values
    pub fn apply_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_IDENTITY_POOL_ID) {
            self.identity_pool_id = Some(v);
        }
        if let Some(v) = lookup(ENV_AUTH_ROLE_ARN) {
            self.auth_role_arn = Some(v);
        }
        if let Some(v) = lookup(ENV_PROVIDER_ENDPOINT) {
            self.provider_endpoint = Some(v);
        }
        if let Some(v) = lookup(ENV_EMIT_READY_EVENT) {
            self.emit_ready_event = parse_flag(&v);
        }
        if let Some(v) = lookup(ENV_CONFIRMED_AUTH_EVENTS_ONLY) {
            self.confirmed_auth_events_only = parse_flag(&v);
        }
        self
    }

    /// Missing identifiers become empty strings, which
    /// `ClientConfig::validate` rejects
    pub fn into_client_config(self) -> ClientConfig {
        ClientConfig {
            identity_pool_id: self.identity_pool_id.unwrap_or_default(),
            auth_role_arn: self.auth_role_arn.unwrap_or_default(),
            provider_endpoint: self.provider_endpoint.unwrap_or_default(),
            emit_ready_event: self.emit_ready_event,
            confirmed_auth_events_only: self.confirmed_auth_events_only,
            ..ClientConfig::default()
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
