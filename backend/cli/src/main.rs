mod api;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use lineecho_channels::{BotContext, ChannelAdapter, LineAdapter, LineClient, LineConfig};
use lineecho_config::{ensure_valid, redact, validate, BotConfig, ConfigError};
use lineecho_core::MessagingApi;
use lineecho_logging::{init_logger, MessageLog};
use lineecho_media::MediaStore;
use lineecho_memory::UserStore;

#[derive(Parser)]
#[command(name = "lineecho")]
#[command(about = "lineecho: LINE webhook receiver that records users and echoes messages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Load and validate configuration, then print it with secrets masked
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Missing secrets abort here, before anything binds.
    let config = lineecho_config::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { port } => {
            let config = with_port_override(config, port).context("invalid --port")?;
            init_logger(config.log_dir.as_deref(), config.log_level());
            run_server(config).await?;
        }
        Commands::CheckConfig => {
            let report = validate(&config);
            for w in &report.warnings {
                println!("warning: {w}");
            }
            println!("{}", serde_json::to_string_pretty(&redact(&config))?);
        }
    }

    Ok(())
}

/// Apply the `--port` flag and re-check the merged config.
fn with_port_override(config: BotConfig, port: Option<u16>) -> Result<BotConfig, ConfigError> {
    match port {
        Some(port) => ensure_valid(BotConfig { port, ..config }),
        None => Ok(config),
    }
}

async fn run_server(config: BotConfig) -> Result<()> {
    info!(config = %redact(&config), "Starting lineecho");
    for w in validate(&config).warnings {
        warn!("{w}");
    }

    let client = LineClient::new(
        config.channel_access_token.clone(),
        config.api_base_url.clone(),
        config.data_api_base_url.clone(),
        config.http_timeout(),
    )?;
    let api: Arc<dyn MessagingApi> = Arc::new(client);

    let ctx = Arc::new(BotContext::new(
        Arc::clone(&api),
        UserStore::new(&config.users_file),
        MessageLog::new(&config.message_log),
        MediaStore::new(&config.upload_dir, api),
    ));

    let adapter = LineAdapter::new(
        LineConfig {
            channel_secret: config.channel_secret.clone(),
            webhook_path: config.webhook_path.clone(),
            max_body_bytes: config.max_body_bytes,
        },
        Arc::clone(&ctx),
    );
    adapter
        .start()
        .await
        .with_context(|| format!("{} adapter failed to start", adapter.name()))?;
    info!("Registered LINE channel adapter");

    let app = api::build_router(ctx, adapter.build_router(), &config.path_prefix);
    let addr = config.socket_addr();

    info!(
        addr = %addr,
        webhook = %format!("{}{}", config.path_prefix, config.webhook_path),
        "HTTP server listening"
    );

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
