//! In-memory `MessagingApi` for tests and local runs without LINE credentials.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;

use lineecho_core::{EchoError, MessagingApi, Profile, ReplyMessage, Result};

/// A reply captured by [`MockMessagingApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub reply_token: String,
    pub messages: Vec<ReplyMessage>,
}

/// Canned profiles and media, recorded replies.
///
/// Unknown profiles and content ids fail like the real API does.
#[derive(Default)]
pub struct MockMessagingApi {
    profiles: Mutex<HashMap<String, String>>,
    content: Mutex<HashMap<String, Bytes>>,
    replies: Mutex<Vec<SentReply>>,
    fail_replies: AtomicBool,
    profile_calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockMessagingApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        lock(&self.profiles).insert(user_id.into(), display_name.into());
        self
    }

    pub fn with_content(self, content_id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        lock(&self.content).insert(content_id.into(), data.into());
        self
    }

    /// Make every reply fail, as with an expired token.
    pub fn failing_replies(self) -> Self {
        self.fail_replies.store(true, Ordering::SeqCst);
        self
    }

    pub fn replies(&self) -> Vec<SentReply> {
        lock(&self.replies).clone()
    }

    /// Text of every message sent so far, in order.
    pub fn reply_texts(&self) -> Vec<String> {
        lock(&self.replies)
            .iter()
            .flat_map(|r| r.messages.iter().map(|m| m.as_text().to_string()))
            .collect()
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingApi for MockMessagingApi {
    async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.profiles)
            .get(user_id)
            .map(|name| Profile {
                display_name: name.clone(),
                user_id: Some(user_id.to_string()),
            })
            .ok_or_else(|| EchoError::upstream("get_profile", format!("404 Not Found: {user_id}")))
    }

    async fn reply_message(&self, reply_token: &str, messages: &[ReplyMessage]) -> Result<()> {
        if self.fail_replies.load(Ordering::SeqCst) {
            return Err(EchoError::upstream("reply_message", "400 Bad Request: Invalid reply token"));
        }
        lock(&self.replies).push(SentReply {
            reply_token: reply_token.to_string(),
            messages: messages.to_vec(),
        });
        Ok(())
    }

    async fn get_message_content(&self, content_id: &str) -> Result<Bytes> {
        lock(&self.content)
            .get(content_id)
            .cloned()
            .ok_or_else(|| EchoError::upstream("get_message_content", format!("404 Not Found: {content_id}")))
    }
}
