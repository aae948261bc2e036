//! `lineecho-config`: runtime configuration for the lineecho webhook receiver.
//!
//! Provides:
//! - Typed config schema with defaults
//! - Environment loading that fails fast on missing secrets
//! - Validation with errors and warnings
//! - Secret redaction for safe logging

pub mod env;
pub mod redact;
pub mod schema;
pub mod validation;

pub use env::{ensure_valid, from_env, from_lookup, ConfigError};
pub use redact::{mask_secret, redact};
pub use schema::BotConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};
