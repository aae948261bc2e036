//! Environment loading for `BotConfig`.
//!
//! Secrets are required. Everything else falls back to a default.

use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::schema::BotConfig;
use crate::validation::validate;

pub const ENV_ACCESS_TOKEN: &str = "LINE_CHANNEL_ACCESS_TOKEN";
pub const ENV_CHANNEL_SECRET: &str = "LINE_CHANNEL_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required env var \"{var_name}\"")]
    MissingEnvVar { var_name: String },

    #[error("Invalid value {value:?} for env var \"{var_name}\": {reason}")]
    InvalidValue {
        var_name: String,
        value: String,
        reason: String,
    },

    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// Load configuration from the process environment.
pub fn from_env() -> Result<BotConfig, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Load configuration through an arbitrary lookup (useful for testing).
pub fn from_lookup<F>(lookup: F) -> Result<BotConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let required = |key: &str| {
        get(key).ok_or_else(|| ConfigError::MissingEnvVar {
            var_name: key.to_string(),
        })
    };

    let mut config = BotConfig::new(required(ENV_ACCESS_TOKEN)?, required(ENV_CHANNEL_SECRET)?);

    if let Some(v) = get("LINEECHO_BIND") {
        config.bind_address = v;
    }
    if let Some(v) = get("LINEECHO_PORT") {
        config.port = parse_number("LINEECHO_PORT", &v)?;
    }
    if let Some(v) = get("LINEECHO_DEBUG") {
        config.debug = parse_bool("LINEECHO_DEBUG", &v)?;
    }
    if let Some(v) = get("LINEECHO_PATH_PREFIX") {
        config.path_prefix = v;
    }
    if let Some(v) = get("LINEECHO_WEBHOOK_PATH") {
        config.webhook_path = v;
    }
    if let Some(v) = get("LINEECHO_USERS_FILE") {
        config.users_file = PathBuf::from(v);
    }
    if let Some(v) = get("LINEECHO_MESSAGE_LOG") {
        config.message_log = PathBuf::from(v);
    }
    if let Some(v) = get("LINEECHO_UPLOAD_DIR") {
        config.upload_dir = PathBuf::from(v);
    }
    config.log_dir = get("LINEECHO_LOG_DIR").map(PathBuf::from);
    if let Some(v) = get("LINEECHO_HTTP_TIMEOUT_SECS") {
        config.http_timeout_secs = parse_number("LINEECHO_HTTP_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = get("LINEECHO_MAX_BODY_BYTES") {
        config.max_body_bytes = parse_number("LINEECHO_MAX_BODY_BYTES", &v)?;
    }
    if let Some(v) = get("LINE_API_BASE_URL") {
        config.api_base_url = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = get("LINE_DATA_API_BASE_URL") {
        config.data_api_base_url = v.trim_end_matches('/').to_string();
    }

    ensure_valid(config)
}

/// Run validation, log warnings, and turn any errors into one `ConfigError`.
///
/// Call again after overriding fields of an already loaded config.
pub fn ensure_valid(config: BotConfig) -> Result<BotConfig, ConfigError> {
    let report = validate(&config);
    for warning in &report.warnings {
        warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if !report.is_valid() {
        let joined = report
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::Validation(joined));
    }

    Ok(config)
}

fn parse_number<T>(var_name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        var_name: var_name.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(var_name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var_name: var_name.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
