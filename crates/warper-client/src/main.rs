//! Warper probe entry point.
//!
//! Connects to the console described by the config file, logs a snapshot of
//! the game state, then idles until Ctrl-C and cleans up.
//!
//! ```text
//! main()
//!  └─ load_config()          -- ~/.config/warper/config.toml, or argv[1]
//!  └─ build_session()        -- WiFi or USB transport
//!  └─ session.connect()      -- open link, detach stale controller
//!  └─ snapshot               -- position, weather, time
//!  └─ ctrl_c
//!  └─ on_close + disconnect  -- centre stick, detach, close link
//! ```
//!
//! `RUST_LOG` overrides the `[logging] log_level` setting.

use std::path::PathBuf;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use warper_client::infrastructure::connection::build_session;
use warper_client::infrastructure::storage::config::{load_config, load_config_from};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => load_config_from(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => load_config().context("loading config")?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    info!("Warper probe starting");

    let session = build_session(&config).context("building transport")?;
    let token = CancellationToken::new();

    // Ctrl-C cancels whatever is in flight and ends the idle wait.
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    session
        .connect(&token)
        .await
        .context("connecting to console")?;

    let position = session.get_player_position(&token).await;
    info!(
        "player position x={} y={} z={}",
        position.x, position.y, position.z
    );
    match session.get_current_weather(&token).await {
        Ok(weather) => info!("weather bytes {weather:02X?}"),
        Err(e) => warn!("could not read weather: {e}"),
    }
    match session.get_current_time(&token).await {
        Ok(time) => info!("clock bytes {time:02X?}"),
        Err(e) => warn!("could not read clock: {e}"),
    }

    info!("Warper probe ready. Press Ctrl-C to detach and exit");
    token.cancelled().await;

    // The shared token is spent; cleanup runs under a fresh one.
    let cleanup = CancellationToken::new();
    if let Err(e) = session.on_close(&cleanup).await {
        error!("controller cleanup failed: {e}");
    }
    session.disconnect(&cleanup).await;

    info!("Warper probe stopped");
    Ok(())
}
