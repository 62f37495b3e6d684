//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Oid`] - Git object identifier (SHA)
//! - [`TreeId`] - Identifier of a directory snapshot served for download
//! - [`ModuleCoordinate`] - The (namespace, name, provider) triple
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so a request path segment that fails validation
//! never reaches the object store.
//!
//! # Examples
//!
//! ```
//! use modreg::core::types::{ModuleCoordinate, Oid, TreeId};
//!
//! let coordinate = ModuleCoordinate::new("acme", "widget", "aws").unwrap();
//! assert_eq!(coordinate.to_string(), "acme/widget/aws");
//!
//! let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
//! let tree = TreeId::from(oid);
//! assert_eq!(tree.as_str(), "abc123def4567890abc123def4567890abc12345");
//!
//! assert!(ModuleCoordinate::new("acme", "", "aws").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use thiserror::Error;

use super::version::Version;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid module coordinate: {0}")]
    InvalidCoordinate(String),
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use modreg::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// The OID is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    fn validate(oid: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the directory snapshot a version tag points at.
///
/// This is the tree object of the tagged commit. It is never stored by the
/// registry; it is recomputed from the repository on every request, so it
/// changes whenever the tag is moved to a commit with different content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeId(Oid);

impl TreeId {
    /// The underlying tree object id.
    pub fn oid(&self) -> &Oid {
        &self.0
    }

    /// Get the tree id as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Check whether a client-supplied identifier names this tree.
    ///
    /// The comparison is exact: an abbreviated or differently-cased id is
    /// a different download URL and does not match.
    pub fn matches(&self, supplied: &str) -> bool {
        self.as_str() == supplied
    }
}

impl From<Oid> for TreeId {
    fn from(oid: Oid) -> Self {
        Self(oid)
    }
}

impl std::fmt::Display for TreeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A module coordinate: `namespace/name/provider`.
///
/// Components are opaque and case-sensitive. They must be non-empty and may
/// not contain `/`, since each one is a single path segment in the registry
/// protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleCoordinate {
    namespace: String,
    name: String,
    provider: String,
}

impl ModuleCoordinate {
    /// Create a new validated coordinate.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidCoordinate` if any component is empty or
    /// contains a `/`.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let namespace = namespace.into();
        let name = name.into();
        let provider = provider.into();

        for (label, value) in [
            ("namespace", &namespace),
            ("name", &name),
            ("provider", &provider),
        ] {
            Self::validate_component(label, value)?;
        }

        Ok(Self {
            namespace,
            name,
            provider,
        })
    }

    fn validate_component(label: &str, value: &str) -> Result<(), TypeError> {
        if value.is_empty() {
            return Err(TypeError::InvalidCoordinate(format!(
                "{label} cannot be empty"
            )));
        }
        if value.contains('/') {
            return Err(TypeError::InvalidCoordinate(format!(
                "{label} cannot contain '/': {value}"
            )));
        }
        Ok(())
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The registry module id for a version: the four components joined by `/`.
    ///
    /// # Example
    ///
    /// ```
    /// use modreg::core::types::ModuleCoordinate;
    /// use modreg::core::version::Version;
    ///
    /// let coordinate = ModuleCoordinate::new("acme", "widget", "aws").unwrap();
    /// let version: Version = "1.2".parse().unwrap();
    /// assert_eq!(coordinate.module_id(&version), "acme/widget/aws/1.2.0");
    /// ```
    pub fn module_id(&self, version: &Version) -> String {
        format!("{}/{}", self, version)
    }

    /// File name offered for a downloaded archive of `version`.
    pub fn archive_file_name(&self, version: &Version) -> String {
        format!(
            "{}_{}_{}_{}.tgz",
            self.namespace, self.name, self.provider, version
        )
    }
}

impl std::fmt::Display for ModuleCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.name, self.provider)
    }
}
