//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// modreg - a module registry served from git tags
#[derive(Parser, Debug)]
#[command(name = "modreg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the registry protocol on every configured listener
    #[command(
        long_about = "Serve the registry protocol on every configured listener.\n\n\
            Configuration is read from the given files and directories. A \
            directory contributes every *.toml file it contains. Versions are \
            read from the module repositories on every request, so pushing a \
            new tag makes it visible immediately.",
        after_help = "\
EXAMPLES:
    modreg serve /etc/modreg/registry.toml
    modreg serve /etc/modreg/conf.d
    modreg --debug serve registry.toml modules.toml"
    )]
    Serve {
        /// Configuration files or directories
        #[arg(required = true, value_name = "CONFIG")]
        config: Vec<PathBuf>,
    },

    /// Validate configuration and summarize it without serving
    Check {
        /// Configuration files or directories
        #[arg(required = true, value_name = "CONFIG")]
        config: Vec<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_takes_many_paths() {
        let cli = Cli::try_parse_from(["modreg", "serve", "a.toml", "conf.d"]).unwrap();
        match cli.command {
            Command::Serve { config } => assert_eq!(config.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["modreg", "check"]).is_err());
    }

    #[test]
    fn debug_is_global() {
        let cli = Cli::try_parse_from(["modreg", "check", "a.toml", "--debug"]).unwrap();
        assert!(cli.debug);
    }
}
