//! LINE Messaging API client
//!
//! Profile lookup, reply delivery and media download over HTTPS, each call
//! bounded by the client timeout.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use tracing::{debug, error};

use lineecho_core::{EchoError, MessagingApi, Profile, ReplyMessage, Result};
use lineecho_logging::redact_sensitive_data;

pub struct LineClient {
    http: Client,
    access_token: String,
    api_base_url: String,
    data_api_base_url: String,
}

impl LineClient {
    pub fn new(
        access_token: impl Into<String>,
        api_base_url: impl Into<String>,
        data_api_base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EchoError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            access_token: access_token.into(),
            api_base_url: api_base_url.into(),
            data_api_base_url: data_api_base_url.into(),
        })
    }

    /// Turn transport errors and non-2xx responses into `EchoError::Upstream`.
    async fn check(api: &str, result: reqwest::Result<Response>) -> Result<Response> {
        let res = result.map_err(|e| EchoError::upstream(api, redact_sensitive_data(&e.to_string())))?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        let message = redact_sensitive_data(&format!("{status}: {body}"));
        error!(api, %status, "LINE API call failed");
        Err(EchoError::upstream(api, message))
    }
}

#[async_trait]
impl MessagingApi for LineClient {
    async fn get_profile(&self, user_id: &str) -> Result<Profile> {
        let url = format!(
            "{}/v2/bot/profile/{}",
            self.api_base_url,
            urlencoding::encode(user_id)
        );
        let sent = self.http.get(&url).bearer_auth(&self.access_token).send().await;
        let res = Self::check("get_profile", sent).await?;
        res.json::<Profile>()
            .await
            .map_err(|e| EchoError::upstream("get_profile", e))
    }

    async fn reply_message(&self, reply_token: &str, messages: &[ReplyMessage]) -> Result<()> {
        let url = format!("{}/v2/bot/message/reply", self.api_base_url);
        let sent = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({
                "replyToken": reply_token,
                "messages": messages,
            }))
            .send()
            .await;
        Self::check("reply_message", sent).await?;
        debug!(count = messages.len(), "Reply delivered");
        Ok(())
    }

    async fn get_message_content(&self, content_id: &str) -> Result<Bytes> {
        let url = format!(
            "{}/v2/bot/message/{}/content",
            self.data_api_base_url,
            urlencoding::encode(content_id)
        );
        let sent = self.http.get(&url).bearer_auth(&self.access_token).send().await;
        let res = Self::check("get_message_content", sent).await?;
        res.bytes()
            .await
            .map_err(|e| EchoError::upstream("get_message_content", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::{get, post},
    };
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[derive(Clone, Default)]
    struct StubState {
        calls: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    }

    fn auth(headers: &HeaderMap) -> Option<String> {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    async fn profile(
        State(state): State<StubState>,
        Path(user_id): Path<String>,
        headers: HeaderMap,
    ) -> impl IntoResponse {
        state.calls.lock().unwrap().push(("profile".into(), auth(&headers), Value::String(user_id.clone())));
        if user_id == "Ublocked" {
            return (StatusCode::NOT_FOUND, Json(serde_json::json!({"message": "Not found"}))).into_response();
        }
        Json(serde_json::json!({"displayName": "王小明", "userId": user_id})).into_response()
    }

    async fn reply(State(state): State<StubState>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
        state.calls.lock().unwrap().push(("reply".into(), auth(&headers), body.clone()));
        if body["replyToken"] == "expired" {
            return (StatusCode::BAD_REQUEST, "Invalid reply token").into_response();
        }
        Json(serde_json::json!({})).into_response()
    }

    async fn content(Path(id): Path<String>) -> impl IntoResponse {
        if id == "m-ok" {
            (StatusCode::OK, vec![0xFFu8, 0xD8, 0xFF]).into_response()
        } else {
            StatusCode::NOT_FOUND.into_response()
        }
    }

    async fn spawn_stub() -> (String, StubState, oneshot::Sender<()>) {
        let state = StubState::default();
        let app = Router::new()
            .route("/v2/bot/profile/:user_id", get(profile))
            .route("/v2/bot/message/reply", post(reply))
            .route("/v2/bot/message/:id/content", get(content))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
        (format!("http://{addr}"), state, shutdown_tx)
    }

    fn client(base: &str) -> LineClient {
        LineClient::new("test-token", base, base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn reply_posts_token_and_messages() {
        let (base, state, shutdown) = spawn_stub().await;

        client(&base)
            .reply_message("r1", &[ReplyMessage::text("You said: hello")])
            .await
            .unwrap();

        let calls = state.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        let (name, auth, body) = &calls[0];
        assert_eq!(name, "reply");
        assert_eq!(auth.as_deref(), Some("Bearer test-token"));
        assert_eq!(body["replyToken"], "r1");
        assert_eq!(body["messages"][0]["type"], "text");
        assert_eq!(body["messages"][0]["text"], "You said: hello");
        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn rejected_reply_is_upstream_error() {
        let (base, _state, shutdown) = spawn_stub().await;

        let err = client(&base)
            .reply_message("expired", &[ReplyMessage::text("late")])
            .await
            .unwrap_err();

        match err {
            EchoError::Upstream { api, message } => {
                assert_eq!(api, "reply_message");
                assert!(message.contains("400"));
            }
            other => panic!("unexpected error: {other}"),
        }
        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn profile_lookup() {
        let (base, _state, shutdown) = spawn_stub().await;
        let api = client(&base);

        let profile = api.get_profile("U1").await.unwrap();
        assert_eq!(profile.display_name, "王小明");
        assert!(api.get_profile("Ublocked").await.is_err());
        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn content_download() {
        let (base, _state, shutdown) = spawn_stub().await;
        let api = client(&base);

        let bytes = api.get_message_content("m-ok").await.unwrap();
        assert_eq!(&bytes[..], &[0xFF, 0xD8, 0xFF]);
        assert!(matches!(
            api.get_message_content("m-missing").await,
            Err(EchoError::Upstream { .. })
        ));
        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn unreachable_host_is_upstream_error() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let api = LineClient::new("t", "http://127.0.0.1:9", "http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(matches!(api.get_profile("U1").await, Err(EchoError::Upstream { .. })));
    }
}
