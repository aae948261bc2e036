//! Typed configuration for the bot process.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::redact::mask_secret;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_WEBHOOK_PATH: &str = "/line-webhook";
pub const DEFAULT_USERS_FILE: &str = "data/users.json";
pub const DEFAULT_MESSAGE_LOG: &str = "data/messages.log";
pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_API_BASE_URL: &str = "https://api.line.me";
pub const DEFAULT_DATA_API_BASE_URL: &str = "https://api-data.line.me";

/// Everything the process needs at startup.
#[derive(Clone, Serialize)]
pub struct BotConfig {
    /// Bearer token for the Messaging API.
    pub channel_access_token: String,
    /// HMAC key used to sign webhook bodies.
    pub channel_secret: String,
    pub bind_address: String,
    pub port: u16,
    /// Debug mode: verbose logging including raw webhook bodies.
    pub debug: bool,
    /// Mount prefix when running behind a reverse proxy, e.g. `/line-api-wolf`.
    pub path_prefix: String,
    pub webhook_path: String,
    pub users_file: PathBuf,
    pub message_log: PathBuf,
    pub upload_dir: PathBuf,
    /// Directory for rotated JSON log files; console only when unset.
    pub log_dir: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub api_base_url: String,
    pub data_api_base_url: String,
}

impl BotConfig {
    /// Config with every optional field at its default.
    pub fn new(channel_access_token: impl Into<String>, channel_secret: impl Into<String>) -> Self {
        Self {
            channel_access_token: channel_access_token.into(),
            channel_secret: channel_secret.into(),
            bind_address: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            debug: false,
            path_prefix: String::new(),
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
            users_file: PathBuf::from(DEFAULT_USERS_FILE),
            message_log: PathBuf::from(DEFAULT_MESSAGE_LOG),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            log_dir: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            data_api_base_url: DEFAULT_DATA_API_BASE_URL.to_string(),
        }
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Default tracing filter when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("channel_access_token", &mask_secret(&self.channel_access_token))
            .field("channel_secret", &mask_secret(&self.channel_secret))
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("debug", &self.debug)
            .field("path_prefix", &self.path_prefix)
            .field("webhook_path", &self.webhook_path)
            .field("users_file", &self.users_file)
            .field("message_log", &self.message_log)
            .field("upload_dir", &self.upload_dir)
            .field("log_dir", &self.log_dir)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("api_base_url", &self.api_base_url)
            .field("data_api_base_url", &self.data_api_base_url)
            .finish()
    }
}
