use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use lineecho_channels::BotContext;
use lineecho_media::uploads_router;

/// Build the full HTTP surface: webhook, admin views and stored uploads.
///
/// Everything is mounted under `prefix` when it is non-empty, so the app can
/// sit behind a reverse proxy path such as `/line-api-wolf`.
pub fn build_router(ctx: Arc<BotContext>, line_router: Router, prefix: &str) -> Router {
    let uploads = uploads_router(ctx.media.upload_dir().to_path_buf());

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/users", get(list_users))
        .with_state(ctx)
        .nest("/uploads", uploads)
        .merge(line_router);

    let app = if prefix.is_empty() {
        app
    } else {
        Router::new().nest(prefix, app)
    };

    app.layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "lineecho",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Read-only view of the user table.
async fn list_users(State(ctx): State<Arc<BotContext>>) -> Result<Json<Value>, StatusCode> {
    match ctx.users.load_all().await {
        Ok(users) => Ok(Json(json!({ "count": users.len(), "users": users }))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load users");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
