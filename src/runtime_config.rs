//! # Runtime Configuration Module
//!
//! Two layers of configuration:
//!
//! - [`RuntimeConfig`], read from environment variables at startup
//! - [`ServiceConfig`], loaded from a YAML file; envelope and auth settings
//!
//! ## Environment Variables
//!
//! ### `APISTREAM_SCHEMA_CACHE`
//!
//! `on` (default) shares compiled schemas between routes with identical schema text;
//! `off` compiles every route's schemas separately.
//!
//! ### `APISTREAM_VALIDATE_OUTPUT`
//!
//! `true` (default) keeps the `validate_output` stage. `false` drops it from every route
//! registered afterwards.
//!
//! ### `APISTREAM_ARRAY_PARAMS`
//!
//! `true` keeps every value of a repeated query parameter as a JSON array. Default
//! `false`: the first value wins.
//!
//! ## YAML
//!
//! ```yaml
//! envelope:
//!   code: "0"
//!   message: ok
//!   error_code: "1"
//! auth:
//!   token_key: token
//!   user_id_key: userId
//!   jwt_secret: change-me
//!   user_claim: sub
//! ```
//!
//! Every key is optional.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub schema_cache: bool,
    pub validate_output: bool,
    pub array_params: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            schema_cache: true,
            validate_output: true,
            array_params: false,
        }
    }
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("1" | "true" | "on" | "yes") => true,
        Some("0" | "false" | "off" | "no") => false,
        _ => default,
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            schema_cache: parse_flag(lookup("APISTREAM_SCHEMA_CACHE"), defaults.schema_cache),
            validate_output: parse_flag(
                lookup("APISTREAM_VALIDATE_OUTPUT"),
                defaults.validate_output,
            ),
            array_params: parse_flag(lookup("APISTREAM_ARRAY_PARAMS"), defaults.array_params),
        }
    }
}

/// Success and error envelope fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub code: String,
    pub message: String,
    pub error_code: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            code: "0".into(),
            message: "ok".into(),
            error_code: "1".into(),
        }
    }
}

/// Token lookup and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header, cookie and document key carrying the token
    pub token_key: String,
    /// Document key the resolved user id is written to
    pub user_id_key: String,
    /// HS256 secret; when set, tokens are verified as JWTs
    pub jwt_secret: Option<String>,
    /// JWT claim holding the user id
    pub user_claim: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_key: "token".into(),
            user_id_key: "userId".into(),
            jwt_secret: None,
            user_claim: "sub".into(),
        }
    }
}

/// File-based service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub envelope: EnvelopeConfig,
    pub auth: AuthConfig,
}

impl ServiceConfig {
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
        Self::from_yaml_str(&content)
    }
}
