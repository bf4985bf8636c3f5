//! tapcast device server entry point.
//!
//! Connects out to the desktop controller, sends the handshake, then runs a
//! single session: control messages drive touch injection while the video
//! stream is written back over the same socket.
//!
//! # Usage
//!
//! ```text
//! tapcast-server [OPTIONS]
//!
//! Options:
//!   --config  <PATH>  TOML configuration file [default: tapcast.toml]
//!   --address <ADDR>  Controller address, overrides `[connection] address`
//!   --gen-config      Print the default configuration and exit
//! ```
//!
//! `TAPCAST_CONFIG` and `TAPCAST_ADDRESS` set the same options from the
//! environment. `RUST_LOG` takes precedence over `[logging] level`.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                 -- TOML file, defaults when absent
//!  └─ DesktopConnection::connect()  -- TCP connect + handshake
//!  └─ run_session()                 -- until the controller closes or Ctrl+C
//!       ├─ VideoStreamer (spawned)  -> SyntheticCapture -> VideoSink
//!       └─ InputDispatcher          <- ControlReader    -> LoggingInjector
//!  └─ ConnectionCloser::shutdown()  -- half-close both directions, then close
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tapcast_server::application::run_session::{run_session, Capabilities};
use tapcast_server::application::screen_geometry::ScreenInfoProvider;
use tapcast_server::infrastructure::capture::SyntheticCapture;
use tapcast_server::infrastructure::connection::DesktopConnection;
use tapcast_server::infrastructure::input_injection::LoggingInjector;
use tapcast_server::infrastructure::screen_info::SharedScreenInfo;
use tapcast_server::infrastructure::storage::config::{load_config, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// tapcast device server.
///
/// Streams the device screen to a desktop controller and injects the touch
/// events it sends back.
#[derive(Debug, Parser)]
#[command(
    name = "tapcast-server",
    about = "Screen streaming and touch injection server for a desktop controller",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// A missing file is not an error; every setting has a default.
    #[arg(long, default_value = "tapcast.toml", env = "TAPCAST_CONFIG")]
    config: PathBuf,

    /// Address of the desktop controller.
    #[arg(long, env = "TAPCAST_ADDRESS")]
    address: Option<SocketAddr>,

    /// Print the default configuration as TOML and exit.
    #[arg(long)]
    gen_config: bool,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("failed to load config from '{}'", self.config.display()))?;
        if let Some(address) = self.address {
            config.connection.address = address;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.gen_config {
        print!("{}", ServerConfig::default().to_toml_string()?);
        return Ok(());
    }

    let config = cli.into_server_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "tapcast server starting: device={}, controller={}",
        config.device.name, config.connection.address
    );

    let screen = Arc::new(SharedScreenInfo::new(
        config.display_info(),
        config.content_crop(),
        config.device.locked_video_orientation,
    ));
    let video_size = screen.screen_info().video_size();

    let connection =
        DesktopConnection::connect(config.connection.address, &config.device.name, video_size)
            .await?;
    let (mut control, video, closer) = connection.split();
    info!("connected to controller, video size {video_size}");

    let caps = Capabilities {
        injector: Arc::new(LoggingInjector::new()),
        capture: Arc::new(SyntheticCapture::new()),
        screen,
    };

    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("failed to listen for Ctrl+C signal: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    let result = run_session(&mut control, Arc::new(video), caps, config.stream_settings(), ctrl_c)
        .await
        .context("session ended with an error");

    if let Err(e) = closer.shutdown().await {
        warn!("failed to shut down controller connection: {e}");
    }
    drop(control);

    info!("tapcast server stopped");
    result
}

// ── Tests ─────────────────────────────────────────────────────────────────────
