use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lantern_protocol::{
    ChannelTransport, OriginPolicy, ProtocolSession, SessionConfig, ToolClient, Transport,
};
use lantern_view::{
    Bootstrap, FrameTransport, HeadlessSurface, LanternConfig, View, forward_ops, read_loop,
    write_loop,
};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

const FLUSH_GRACE: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(
    name = "lantern",
    version,
    about = "Lantern embedded view runtime, driven by JSON frames on stdio"
)]
struct Cli {
    /// Path to lantern.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with a pre-injected UI tree or tool result
    #[arg(long)]
    payload: Option<PathBuf>,

    /// Run without a parent: skip the handshake and post nothing
    #[arg(long)]
    standalone: bool,

    /// Additional origin to accept messages from (repeatable)
    #[arg(long = "origin")]
    origins: Vec<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only frames
    let subscriber = fmt()
        .with_env_filter(EnvFilter::from_env("LANTERN_LOG"))
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut config = LanternConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if cli.standalone {
        config.view.embedded = false;
    }
    config.protocol.allowed_origins.extend(cli.origins);

    let preloaded = match &cli.payload {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read payload {}", path.display()))?;
            Some(
                serde_json::from_str(&raw)
                    .with_context(|| format!("payload {} is not JSON", path.display()))?,
            )
        }
        None => None,
    };

    tracing::info!(
        embedded = config.view.embedded,
        origins = ?config.protocol.allowed_origins,
        "Starting Lantern view"
    );

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let transport: Arc<dyn Transport> = if config.view.embedded {
        Arc::new(FrameTransport::new(out_tx.clone(), config.protocol.target_origin.clone()))
    } else {
        Arc::new(ChannelTransport::detached())
    };

    let client = Arc::new(ToolClient::new(transport.clone(), config.protocol.tool_timeout()));
    let session = Arc::new(ProtocolSession::new(
        transport,
        client,
        OriginPolicy::new(&config.protocol.allowed_origins),
        SessionConfig {
            protocol_version: config.protocol.version.clone(),
            ..SessionConfig::default()
        },
    ));

    let (op_tx, op_rx) = mpsc::unbounded_channel();
    let surface = HeadlessSurface::new(config.view.viewport_width).with_sink(op_tx);
    let view = View::new(session, surface, config.view);

    tokio::spawn(forward_ops(op_rx, out_tx));
    let writer = tokio::spawn(write_loop(tokio::io::stdout(), out_rx));

    view.start(Bootstrap { preloaded })?;

    read_loop(BufReader::new(tokio::io::stdin()), &view).await?;

    tracing::info!("Input closed, shutting down");
    // Pending status timers keep the output channel open, so only wait
    // briefly for queued frames to drain.
    drop(view);
    if tokio::time::timeout(FLUSH_GRACE, writer).await.is_err() {
        tracing::debug!("Output still open at shutdown");
    }
    Ok(())
}
