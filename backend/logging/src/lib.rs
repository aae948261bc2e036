//! Telemetry, structured logging and the message audit log for lineecho.
//!
//! Handles log redaction, console and rotated JSON output, and the
//! append-only record of delivered messages.

pub mod logger;
pub mod message_log;
pub mod redact;

pub use logger::init_logger;
pub use message_log::{MessageLog, MessageLogEntry};
pub use redact::redact_sensitive_data;
