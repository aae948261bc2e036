use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::message::ReplyMessage;
use crate::types::Profile;

/// The slice of the LINE Messaging API the bot consumes.
///
/// Every failure is reported as `EchoError::Upstream`.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Look up a user's public profile. Fails when the user has blocked the bot.
    async fn get_profile(&self, user_id: &str) -> Result<Profile>;

    /// Send messages bound to a single-use reply token.
    async fn reply_message(&self, reply_token: &str, messages: &[ReplyMessage]) -> Result<()>;

    /// Download the binary content of a media message.
    async fn get_message_content(&self, content_id: &str) -> Result<Bytes>;
}
