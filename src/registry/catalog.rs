//! registry::catalog
//!
//! Version enumeration and resolution for one module store.
//!
//! Versions are never indexed or cached: every call re-enumerates the
//! store's references, so answers always reflect the current tags at the
//! cost of O(references) work per call.

use tracing::debug;

use crate::core::types::TreeId;
use crate::core::version::Version;
use crate::git::{CommitSnapshot, ObjectStore, StoreError};

/// Prefix of references that name module versions.
pub const VERSION_TAG_PREFIX: &str = "refs/tags/v";

/// Parse the version named by a reference, if it is version-shaped.
///
/// # Example
///
/// ```
/// use modreg::registry::catalog::version_from_ref;
///
/// assert_eq!(version_from_ref("refs/tags/v1.2").unwrap().to_string(), "1.2.0");
/// assert!(version_from_ref("refs/tags/release-1").is_none());
/// assert!(version_from_ref("refs/heads/v1.0.0").is_none());
/// assert!(version_from_ref("refs/tags/vnext").is_none());
/// ```
pub fn version_from_ref(refname: &str) -> Option<Version> {
    let raw = refname.strip_prefix(VERSION_TAG_PREFIX)?;
    Version::parse(raw).ok()
}

/// The tag reference a version resolves through: `refs/tags/v<canonical>`.
pub fn tag_ref_name(version: &Version) -> String {
    format!("{VERSION_TAG_PREFIX}{version}")
}

/// Versions available in one module store.
pub struct VersionCatalog<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: ObjectStore + ?Sized> VersionCatalog<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Every version-shaped tag, latest first.
    ///
    /// Malformed version tags are skipped. Tags whose versions are equal in
    /// precedence (`v1.0` and `v1.0.0`) appear once, as the first one the
    /// store enumerates. An empty store yields an empty list.
    ///
    /// # Errors
    ///
    /// Fails only if the references cannot be enumerated.
    pub fn list_versions(&self) -> Result<Vec<Version>, StoreError> {
        let mut versions: Vec<Version> = self
            .store
            .reference_names()?
            .iter()
            .filter_map(|name| {
                let parsed = version_from_ref(name);
                if parsed.is_none() && name.starts_with(VERSION_TAG_PREFIX) {
                    debug!(refname = %name, "ignoring tag that is not a valid version");
                }
                parsed
            })
            .collect();

        // Stable, so precedence-equal tags keep enumeration order.
        versions.sort_by(|a, b| b.cmp(a));
        versions.dedup();
        Ok(versions)
    }

    /// The latest version, or `None` if there are no version tags.
    pub fn latest_version(&self) -> Result<Option<Version>, StoreError> {
        Ok(self.list_versions()?.into_iter().next())
    }

    /// Whether some version tag is precedence-equal to `version`.
    pub fn has_version(&self, version: &Version) -> Result<bool, StoreError> {
        Ok(self
            .store
            .reference_names()?
            .iter()
            .filter_map(|name| version_from_ref(name))
            .any(|candidate| candidate == *version))
    }

    /// The commit behind `refs/tags/v<version>`.
    ///
    /// Fails with [`StoreError::RefNotFound`] if that exact tag is absent.
    pub fn resolve_commit(&self, version: &Version) -> Result<CommitSnapshot, StoreError> {
        self.store.peel_to_commit(&tag_ref_name(version))
    }

    /// The directory snapshot tagged for `version`.
    ///
    /// Fails with [`StoreError::RefNotFound`] if the tag is absent, and with
    /// another variant if it cannot be read.
    pub fn resolve_tree_id(&self, version: &Version) -> Result<TreeId, StoreError> {
        Ok(self.resolve_commit(version)?.tree)
    }
}
