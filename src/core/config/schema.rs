//! core::config::schema
//!
//! Configuration file schema.
//!
//! A configuration may be split across several files; each file is parsed
//! into a [`ConfigFile`] and the results are merged by
//! [`Config::load`](super::Config::load).
//!
//! # Example
//!
//! ```toml
//! hostname = "registry.example.com"
//!
//! [[listen]]
//! address = "127.0.0.1:8080"
//!
//! [[listen]]
//! address = "/run/modreg.sock"
//!
//! [[module]]
//! namespace = "acme"
//! name = "widget"
//! provider = "aws"
//! git_dir = "/srv/git/widget-aws.git"
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// One configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Hostname the registry is reachable under, used in module source addresses.
    pub hostname: Option<String>,

    /// Listeners to serve on.
    pub listen: Vec<ListenerSection>,

    /// Modules to serve.
    pub module: Vec<ModuleSection>,
}

/// A `[[listen]]` block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ListenerSection {
    /// `host:port` for TCP, or an absolute path for a Unix domain socket.
    pub address: String,
}

/// A `[[module]]` block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModuleSection {
    pub namespace: String,
    pub name: String,
    pub provider: String,
    /// Repository path; relative paths are resolved against the directory
    /// containing the configuration file.
    pub git_dir: PathBuf,
}

/// A validated listen address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddress {
    /// TCP `host:port`, resolved when binding.
    Tcp(String),
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl ListenAddress {
    /// Interpret a configured address.
    ///
    /// Addresses starting with `/` are Unix socket paths; anything else is
    /// a TCP address.
    pub fn parse(address: &str) -> Result<Self, ConfigError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ConfigError::InvalidValue(
                "listener address cannot be empty".into(),
            ));
        }
        if address.starts_with('/') {
            Ok(ListenAddress::Unix(PathBuf::from(address)))
        } else {
            Ok(ListenAddress::Tcp(address.to_string()))
        }
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenAddress::Tcp(addr) => write!(f, "tcp://{addr}"),
            ListenAddress::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// The registry hostname, normalized for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hostname(String);

impl Hostname {
    /// Validate and normalize a hostname with an optional port.
    ///
    /// Labels are ASCII letters, digits and hyphens, 1 to 63 characters,
    /// not starting or ending with a hyphen. The result is lowercase.
    ///
    /// # Example
    ///
    /// ```
    /// use modreg::core::config::Hostname;
    ///
    /// let host = Hostname::parse("Registry.Example.COM:8443").unwrap();
    /// assert_eq!(host.for_display(), "registry.example.com:8443");
    /// assert!(Hostname::parse("bad_host").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |why: &str| ConfigError::InvalidHostname {
            hostname: raw.to_string(),
            reason: why.to_string(),
        };

        let lowered = raw.trim().to_ascii_lowercase();
        let (host, port) = match lowered.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (lowered.as_str(), None),
        };

        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        for label in host.split('.') {
            if label.is_empty() || label.len() > 63 {
                return Err(invalid("each label must be 1 to 63 characters"));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(invalid("labels cannot start or end with '-'"));
            }
            if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
                return Err(invalid("labels may only contain letters, digits and '-'"));
            }
        }
        if let Some(port) = port {
            if port.parse::<u16>().map(|p| p == 0).unwrap_or(true) {
                return Err(invalid("port must be a number between 1 and 65535"));
            }
        }

        Ok(Self(lowered))
    }

    /// The hostname as shown in module source addresses.
    pub fn for_display(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hostname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
