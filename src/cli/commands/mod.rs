//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads and validates configuration
//! 2. Hands it to the server or inspects it
//! 3. Formats and displays output
//!
//! Handlers are synchronous; `serve` builds its own tokio runtime.

mod check;
mod serve;

pub use check::check;
pub use serve::serve;

use super::args::Command;
use anyhow::Result;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Serve { config } => serve(&config),
        Command::Check { config } => check(&config),
    }
}
