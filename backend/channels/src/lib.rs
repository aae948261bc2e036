use async_trait::async_trait;

pub mod dispatcher;
pub mod line;
pub mod line_receive;
pub mod line_send;
pub mod mock;

pub use dispatcher::{BotContext, DispatchReport, EventDispatcher};
pub use line::{LineAdapter, LineConfig};
pub use line_receive::LineReceive;
pub use line_send::LineClient;

/// All channel adapters implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;

    /// Build the Axum sub-router for inbound webhook endpoints.
    fn build_router(&self) -> axum::Router {
        axum::Router::new()
    }

    /// Prepare whatever the adapter needs before the server accepts traffic.
    async fn start(&self) -> lineecho_core::Result<()>;
}
