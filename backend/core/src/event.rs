/// A verified webhook event, reduced to what the dispatcher acts on.
///
/// Anything the bot does not handle collapses into `Unsupported` so that
/// matching stays exhaustive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Text {
        user_id: String,
        reply_token: String,
        body: String,
    },
    Image {
        user_id: String,
        reply_token: String,
        content_id: String,
    },
    Unsupported {
        event_type: String,
        detail: String,
    },
}

impl InboundEvent {
    /// The sending user, if the event carries one the bot acts on.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Text { user_id, .. } | Self::Image { user_id, .. } => Some(user_id),
            Self::Unsupported { .. } => None,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Unsupported { event_type, .. } => event_type,
        }
    }
}
