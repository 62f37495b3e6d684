//! core::config
//!
//! Configuration schema and loading.
//!
//! # Sources
//!
//! Configuration is read from the paths given on the command line. Each
//! path is either a TOML file or a directory; for a directory, every
//! `*.toml` file directly inside it is read, in file-name order.
//! All files are merged into one [`Config`]:
//!
//! - `hostname` must be set in exactly one file
//! - `[[listen]]` blocks accumulate
//! - `[[module]]` blocks accumulate; declaring the same coordinate twice is
//!   an error that names both declarations
//!
//! # Example
//!
//! ```no_run
//! use modreg::core::config::Config;
//! use std::path::PathBuf;
//!
//! let config = Config::load(&[PathBuf::from("/etc/modreg")]).unwrap();
//! println!("serving {} modules as {}", config.modules.len(), config.hostname);
//! ```

pub mod schema;

pub use schema::{ConfigFile, Hostname, ListenAddress, ListenerSection, ModuleSection};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::modules::{ModuleLocation, ModuleMap};
use crate::core::types::ModuleCoordinate;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration files specified")]
    NoConfigFiles,

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("hostname is not set in any configuration file")]
    MissingHostname,

    #[error("hostname set again in '{second}' (already set in '{first}')")]
    DuplicateHostname { first: PathBuf, second: PathBuf },

    #[error("invalid hostname '{hostname}': {reason}")]
    InvalidHostname { hostname: String, reason: String },

    #[error("duplicate module declaration for {coordinate} at {origin} (already declared at {existing})")]
    DuplicateModule {
        coordinate: String,
        origin: String,
        existing: String,
    },

    #[error("invalid module declaration at {origin}: {message}")]
    InvalidModule { origin: String, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hostname used in module source addresses.
    pub hostname: Hostname,
    /// Listen addresses, in declaration order.
    pub listeners: Vec<ListenAddress>,
    /// Configured modules.
    pub modules: ModuleMap,
    /// Files that contributed to this configuration.
    pub files: Vec<PathBuf>,
}

impl Config {
    /// Load and merge configuration from files and directories.
    ///
    /// # Errors
    ///
    /// Returns an error if no files are found, any file cannot be read or
    /// parsed, or the merged result is invalid.
    pub fn load(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let files = Self::collect_files(paths)?;
        if files.is_empty() {
            return Err(ConfigError::NoConfigFiles);
        }

        let mut parsed = Vec::with_capacity(files.len());
        for path in &files {
            parsed.push((path.clone(), Self::read_file(path)?));
        }

        Self::merge(parsed)
    }

    /// Expand directories into the TOML files they contain.
    fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
        let mut files = Vec::new();

        for path in paths {
            let metadata = fs::metadata(path).map_err(|e| ConfigError::ReadError {
                path: path.clone(),
                source: e,
            })?;

            if !metadata.is_dir() {
                files.push(path.clone());
                continue;
            }

            let entries = fs::read_dir(path).map_err(|e| ConfigError::ReadError {
                path: path.clone(),
                source: e,
            })?;

            let mut found = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| ConfigError::ReadError {
                    path: path.clone(),
                    source: e,
                })?;
                let candidate = entry.path();
                let is_toml = candidate.extension().is_some_and(|ext| ext == "toml");
                if is_toml && candidate.is_file() {
                    found.push(candidate);
                }
            }
            found.sort();
            files.extend(found);
        }

        Ok(files)
    }

    /// Read and parse one configuration file.
    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse_str(path, &contents)
    }

    /// Parse configuration text attributed to `path`.
    pub fn parse_str(path: &Path, contents: &str) -> Result<ConfigFile, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Merge parsed files into a validated configuration.
    pub fn merge(parsed: Vec<(PathBuf, ConfigFile)>) -> Result<Self, ConfigError> {
        let mut hostname: Option<(Hostname, PathBuf)> = None;
        let mut listeners = Vec::new();
        let mut modules = ModuleMap::new();
        let mut files = Vec::with_capacity(parsed.len());

        for (path, file) in parsed {
            if let Some(raw) = &file.hostname {
                if let Some((_, first)) = &hostname {
                    return Err(ConfigError::DuplicateHostname {
                        first: first.clone(),
                        second: path,
                    });
                }
                hostname = Some((Hostname::parse(raw)?, path.clone()));
            }

            for listener in &file.listen {
                listeners.push(ListenAddress::parse(&listener.address)?);
            }

            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            for (index, section) in file.module.iter().enumerate() {
                let origin = format!("{}: module[{}]", path.display(), index);
                let coordinate = ModuleCoordinate::new(
                    section.namespace.as_str(),
                    section.name.as_str(),
                    section.provider.as_str(),
                )
                .map_err(|e| ConfigError::InvalidModule {
                    origin: origin.clone(),
                    message: e.to_string(),
                })?;

                if section.git_dir.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidModule {
                        origin,
                        message: "git_dir cannot be empty".into(),
                    });
                }

                let location = ModuleLocation {
                    git_dir: base_dir.join(&section.git_dir),
                    origin: origin.clone(),
                };

                if let Err(existing) = modules.insert(&coordinate, location) {
                    return Err(ConfigError::DuplicateModule {
                        coordinate: coordinate.to_string(),
                        origin,
                        existing: existing.origin.clone(),
                    });
                }
            }

            files.push(path);
        }

        let (hostname, _) = hostname.ok_or(ConfigError::MissingHostname)?;

        Ok(Config {
            hostname,
            listeners,
            modules,
            files,
        })
    }
}
