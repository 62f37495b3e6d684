//! serve command - Serve the registry

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use tracing::info;

use crate::core::config::Config;
use crate::server::{self, router, RegistryState};

/// Load configuration and serve until interrupted.
pub fn serve(paths: &[PathBuf]) -> Result<()> {
    let config = Config::load(paths).context("Failed to load configuration")?;
    if config.listeners.is_empty() {
        bail!("No listeners configured. Add a [[listen]] block with an address.");
    }

    info!(
        hostname = %config.hostname,
        modules = config.modules.len(),
        files = config.files.len(),
        "configuration loaded"
    );

    let listeners = config.listeners;
    let app = router(RegistryState::new(config.hostname, config.modules));

    let rt = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    rt.block_on(server::serve(&listeners, app))?;

    info!("stopped");
    Ok(())
}
