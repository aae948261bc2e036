//! Config redaction: produce safe-to-log config snapshots by masking secrets.

use serde_json::Value;

use crate::schema::BotConfig;

/// Field names whose values are always masked.
static SECRET_KEYS: &[&str] = &["channel_access_token", "channel_secret"];

/// Mask a secret, keeping a four character hint.
pub fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    if s.chars().count() > 8 {
        format!("{}***", s.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

/// JSON snapshot of the config with every secret masked.
pub fn redact(config: &BotConfig) -> Value {
    let mut value = serde_json::to_value(config).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        for key in SECRET_KEYS {
            if let Some(Value::String(s)) = map.get_mut(*key) {
                *s = mask_secret(s);
            }
        }
    }
    value
}
