//! `chainrelay run`: start the relay, stop on Ctrl-C.

use anyhow::{Context, Result};
use chainrelay_observability::init_tracing;
use chainrelay_stream::{Relay, RelayConfig};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run(config_path: &Path) -> Result<()> {
    let config = RelayConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    init_tracing(&config.log).context("installing tracing subscriber")?;

    let relay = Relay::from_config(config).context("building relay")?;
    for spec in relay.subscriptions() {
        info!(subscription = %spec, "watching");
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!("cannot listen for Ctrl-C: {e}"),
        }
        on_signal.cancel();
    });

    relay.run(cancel).await.context("relay aborted")?;
    Ok(())
}
