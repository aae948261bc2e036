//! LINE adapter. Receives webhook events from the LINE Messaging API.
//! Replies via the LINE Reply API.
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tracing::{debug, error, info, warn};

use lineecho_core::{EchoError, Result};

use crate::dispatcher::{BotContext, EventDispatcher};
use crate::line_receive::{LineReceive, SIGNATURE_HEADER};
use crate::ChannelAdapter;

#[derive(Clone)]
pub struct LineConfig {
    pub channel_secret: String,
    pub webhook_path: String,
    pub max_body_bytes: usize,
}

pub struct LineAdapter {
    config: LineConfig,
    dispatcher: Arc<EventDispatcher>,
}

impl LineAdapter {
    pub fn new(config: LineConfig, ctx: Arc<BotContext>) -> Self {
        Self {
            config,
            dispatcher: Arc::new(EventDispatcher::new(ctx)),
        }
    }
}

#[derive(Clone)]
struct AppState {
    channel_secret: Arc<str>,
    dispatcher: Arc<EventDispatcher>,
}

/// Maps pipeline errors onto the webhook's status codes without leaking detail.
struct WebhookError(EchoError);

impl From<EchoError> for WebhookError {
    fn from(e: EchoError) -> Self {
        Self(e)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        match self.0 {
            EchoError::Auth(e) => {
                warn!(reason = %e, "[LINE] Rejected webhook");
                (StatusCode::BAD_REQUEST, "Bad Request").into_response()
            }
            other => {
                error!(error = %other, "[LINE] Webhook failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, WebhookError> {
    // Verify before touching the body.
    let signature = headers
        .get(SIGNATURE_HEADER)
        .map(|v| v.to_str().unwrap_or_default());
    LineReceive::verify_signature(&state.channel_secret, signature, &body)
        .map_err(EchoError::from)?;

    debug!(body = %String::from_utf8_lossy(&body), "[LINE] Webhook body");

    let events = LineReceive::parse_webhook(&body)?;
    let report = state.dispatcher.dispatch(events).await;
    info!(
        handled = report.handled,
        ignored = report.ignored,
        failed = report.failed,
        "[LINE] Webhook processed"
    );
    Ok("OK")
}

#[async_trait]
impl ChannelAdapter for LineAdapter {
    fn name(&self) -> &str { "line" }

    fn build_router(&self) -> Router {
        let state = AppState {
            channel_secret: Arc::from(self.config.channel_secret.as_str()),
            dispatcher: Arc::clone(&self.dispatcher),
        };
        Router::new()
            .route(&self.config.webhook_path, post(webhook_handler))
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .with_state(state)
    }

    async fn start(&self) -> Result<()> {
        self.dispatcher.context().prepare().await?;
        info!("[LINE] Adapter ready at {}", self.config.webhook_path);
        Ok(())
    }
}
