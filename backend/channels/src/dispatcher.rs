//! Routes verified webhook events to their handlers.
//!
//! Events run one after another. A failing side effect is logged and counted
//! but never stops the remaining steps or events.

use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, error, info, warn};

use lineecho_core::{EchoError, InboundEvent, MessagingApi, ReplyMessage, Result};
use lineecho_logging::MessageLog;
use lineecho_media::MediaStore;
use lineecho_memory::UserStore;

pub const IMAGE_FAILED_REPLY: &str = "Sorry, the image could not be saved. Please try again later.";

pub fn echo_reply(text: &str) -> String {
    format!("You said: {text}")
}

pub fn image_saved_reply(filename: &str) -> String {
    format!("Image received and saved as {filename}")
}

/// Explicitly constructed handles shared by every handler.
pub struct BotContext {
    pub api: Arc<dyn MessagingApi>,
    pub users: UserStore,
    pub message_log: MessageLog,
    pub media: MediaStore,
}

impl BotContext {
    pub fn new(api: Arc<dyn MessagingApi>, users: UserStore, message_log: MessageLog, media: MediaStore) -> Self {
        Self {
            api,
            users,
            message_log,
            media,
        }
    }

    /// Create the directories the stores write into.
    pub async fn prepare(&self) -> Result<()> {
        for dir in [
            self.users.path().parent(),
            self.message_log.path().parent(),
            Some(self.media.upload_dir()),
        ]
        .into_iter()
        .flatten()
        .filter(|p| !p.as_os_str().is_empty())
        {
            create_dir(dir).await?;
        }
        Ok(())
    }
}

async fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| EchoError::storage(dir, e))
}

/// Per-delivery tally, logged by the webhook route.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub handled: usize,
    pub ignored: usize,
    pub failed: usize,
}

pub struct EventDispatcher {
    ctx: Arc<BotContext>,
}

impl EventDispatcher {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    pub async fn dispatch(&self, events: Vec<InboundEvent>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            let outcome = match &event {
                InboundEvent::Text { user_id, reply_token, body } => {
                    Some(self.handle_text(user_id, reply_token, body).await)
                }
                InboundEvent::Image { user_id, reply_token, content_id } => {
                    Some(self.handle_image(user_id, reply_token, content_id).await)
                }
                InboundEvent::Unsupported { event_type, detail } => {
                    info!(event_type = %event_type, detail = %detail, "Ignoring unsupported LINE event");
                    None
                }
            };
            match outcome {
                None => report.ignored += 1,
                Some(Ok(())) => report.handled += 1,
                Some(Err(e)) => {
                    warn!(
                        kind = event.kind(),
                        user_id = event.user_id().unwrap_or_default(),
                        error = %e,
                        "LINE event handled with errors"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn handle_text(&self, user_id: &str, reply_token: &str, body: &str) -> Result<()> {
        let text = body.trim();
        info!(user_id = %user_id, text = %text, "Received LINE text message");

        let logged = self.append_log(user_id, text).await;
        let recorded = self.record_user(user_id).await;
        let replied = self.reply(reply_token, echo_reply(text)).await;
        logged.and(recorded).and(replied)
    }

    async fn handle_image(&self, user_id: &str, reply_token: &str, content_id: &str) -> Result<()> {
        info!(user_id = %user_id, content_id = %content_id, "Received LINE image message");

        let logged = self.append_log(user_id, &format!("[image] {content_id}")).await;
        let recorded = self.record_user(user_id).await;

        let (stored, reply_text) = match self.ctx.media.store_image(content_id).await {
            Ok(media) => {
                info!(user_id = %user_id, filename = %media.filename, "Saved image from user");
                let text = image_saved_reply(&media.filename);
                (Ok(()), text)
            }
            Err(e) => {
                error!(user_id = %user_id, content_id = %content_id, error = %e, "Failed to store image");
                (Err(e), IMAGE_FAILED_REPLY.to_string())
            }
        };
        let replied = self.reply(reply_token, reply_text).await;

        logged.and(recorded).and(stored).and(replied)
    }

    async fn append_log(&self, user_id: &str, text: &str) -> Result<()> {
        self.ctx
            .message_log
            .append_text(user_id, text)
            .await
            .inspect_err(|e| error!(user_id = %user_id, error = %e, "Failed to append message log"))
    }

    async fn record_user(&self, user_id: &str) -> Result<()> {
        let api = Arc::clone(&self.ctx.api);
        let lookup = || async move { api.get_profile(user_id).await.map(|p| p.display_name) };
        match self.ctx.users.upsert(user_id, lookup).await {
            Ok(record) => {
                debug!(user_id = %user_id, count = record.message_count, "User recorded");
                Ok(())
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to record user");
                Err(e)
            }
        }
    }

    /// Best effort: the webhook is acknowledged whatever happens here.
    async fn reply(&self, reply_token: &str, text: String) -> Result<()> {
        self.ctx
            .api
            .reply_message(reply_token, &[ReplyMessage::text(text)])
            .await
            .inspect_err(|e| error!(error = %e, "Failed to send LINE reply"))
    }
}
