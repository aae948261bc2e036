//! Config validation: field checks with user-friendly error messages.

use crate::schema::BotConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &BotConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_server(config, &mut report);
    validate_routes(config, &mut report);
    validate_upstream(config, &mut report);
    report
}

fn validate_server(config: &BotConfig, report: &mut ValidationReport) {
    if config.port == 0 {
        report.error("port", "port must be > 0");
    } else if config.port < 1024 && config.port != 80 && config.port != 443 {
        report.warn(
            "port",
            format!("Port {} requires elevated privileges; consider using a port >= 1024", config.port),
        );
    }
    if config.max_body_bytes == 0 {
        report.error("max_body_bytes", "max_body_bytes must be > 0");
    }
    if config.debug {
        report.warn("debug", "Debug mode logs raw webhook bodies");
    }
}

fn validate_routes(config: &BotConfig, report: &mut ValidationReport) {
    let prefix = &config.path_prefix;
    if !prefix.is_empty() && (!prefix.starts_with('/') || prefix.ends_with('/')) {
        report.error("path_prefix", "path_prefix must start with '/' and must not end with '/'");
    }
    if !config.webhook_path.starts_with('/') {
        report.error("webhook_path", "webhook_path must start with '/'");
    }
}

fn validate_upstream(config: &BotConfig, report: &mut ValidationReport) {
    if config.http_timeout_secs == 0 {
        report.error("http_timeout_secs", "http_timeout_secs must be > 0");
    }
    for (path, url) in [
        ("api_base_url", &config.api_base_url),
        ("data_api_base_url", &config.data_api_base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            report.error(path, "base URL must start with http:// or https://");
        } else if url.starts_with("http://") {
            report.warn(path, "base URL is not using TLS");
        }
    }
}
