//! LINE Webhook Receiver
//!
//! Handles inbound payloads from LINE Messaging API webhooks,
//! including signature validation and event deserialization.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info};

use lineecho_core::{AuthError, EchoError, InboundEvent, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

#[derive(Debug, Deserialize)]
pub struct LineWebhook {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: Option<LineMessage>,
    pub source: Option<LineSource>,
    pub reply_token: Option<String>,
    pub webhook_event_id: Option<String>,
    pub delivery_context: Option<DeliveryContext>,
}

#[derive(Debug, Deserialize)]
pub struct LineMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    #[serde(default)]
    pub is_redelivery: bool,
}

impl LineEvent {
    /// Collapse the wire event into the dispatcher's closed set.
    pub fn into_inbound(self) -> InboundEvent {
        if self.event_type != "message" {
            return InboundEvent::Unsupported {
                event_type: self.event_type,
                detail: String::new(),
            };
        }

        let user_id = self.source.and_then(|s| s.user_id);
        let (Some(user_id), Some(reply_token), Some(message)) = (user_id, self.reply_token, self.message) else {
            return InboundEvent::Unsupported {
                event_type: self.event_type,
                detail: "missing userId, replyToken or message".to_string(),
            };
        };

        match (message.kind.as_str(), message.text, message.id) {
            ("text", Some(body), _) => InboundEvent::Text { user_id, reply_token, body },
            ("image", _, Some(content_id)) => InboundEvent::Image { user_id, reply_token, content_id },
            (kind, _, _) => InboundEvent::Unsupported {
                event_type: self.event_type,
                detail: format!("message type {kind}"),
            },
        }
    }
}

pub struct LineReceive;

impl LineReceive {
    fn keyed_mac(secret: &str) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidSignature)
    }

    /// `base64(HMAC-SHA256(channel_secret, body))`
    pub fn compute_signature(secret: &str, body: &[u8]) -> Result<String, AuthError> {
        let mut mac = Self::keyed_mac(secret)?;
        mac.update(body);
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Validates the `x-line-signature` value against the channel secret.
    ///
    /// The digest comparison is constant time.
    pub fn verify_signature(secret: &str, signature: Option<&str>, body: &[u8]) -> Result<(), AuthError> {
        let signature = signature.ok_or(AuthError::MissingSignature)?;
        let expected = BASE64
            .decode(signature.trim())
            .map_err(|_| AuthError::MalformedSignature)?;

        let mut mac = Self::keyed_mac(secret)?;
        mac.update(body);
        mac.verify_slice(&expected)
            .map_err(|_| AuthError::InvalidSignature)
    }

    /// Parse a verified body into dispatchable events.
    pub fn parse_webhook(body: &[u8]) -> Result<Vec<InboundEvent>> {
        let payload: LineWebhook = serde_json::from_slice(body)
            .map_err(|e| EchoError::Internal(format!("invalid webhook payload: {e}")))?;

        debug!(
            destination = payload.destination.as_deref().unwrap_or(""),
            count = payload.events.len(),
            "Parsed LINE webhook"
        );

        Ok(payload
            .events
            .into_iter()
            .map(|event| {
                if event.delivery_context.as_ref().is_some_and(|c| c.is_redelivery) {
                    info!(
                        webhook_event_id = event.webhook_event_id.as_deref().unwrap_or(""),
                        "Handling redelivered LINE event"
                    );
                }
                event.into_inbound()
            })
            .collect())
    }
}
