//! check command - Validate configuration and module repositories

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};

use crate::core::config::Config;
use crate::git::GitStore;
use crate::registry::VersionCatalog;

/// Load configuration, open every module repository, and print a summary.
///
/// Fails if the configuration is invalid or any repository is unreadable.
pub fn check(paths: &[PathBuf]) -> Result<()> {
    let config = Config::load(paths).context("Failed to load configuration")?;
    let (report, unreadable) = summarize(&config);
    print!("{report}");

    if unreadable > 0 {
        bail!("{unreadable} module repositories could not be read");
    }
    Ok(())
}

/// Render the summary and count unreadable repositories.
fn summarize(config: &Config) -> (String, usize) {
    let mut out = String::new();
    let mut unreadable = 0;

    let _ = writeln!(out, "hostname: {}", config.hostname);
    for file in &config.files {
        let _ = writeln!(out, "file: {}", file.display());
    }
    if config.listeners.is_empty() {
        let _ = writeln!(out, "listen: (none; serve will refuse to start)");
    }
    for listener in &config.listeners {
        let _ = writeln!(out, "listen: {listener}");
    }

    for (coordinate, location) in config.modules.iter() {
        let status = GitStore::open(&location.git_dir).and_then(|store| {
            VersionCatalog::new(&store).list_versions()
        });
        match status {
            Ok(versions) => match versions.first() {
                Some(latest) => {
                    let _ = writeln!(
                        out,
                        "module: {coordinate}: {} versions, latest {latest}",
                        versions.len()
                    );
                }
                None => {
                    let _ = writeln!(out, "module: {coordinate}: no versions");
                }
            },
            Err(err) => {
                unreadable += 1;
                let _ = writeln!(out, "module: {coordinate}: unreadable ({location}): {err}");
            }
        }
    }

    (out, unreadable)
}
