//! git::interface
//!
//! Read-only object store access implemented with git2.
//!
//! # Architecture
//!
//! [`ObjectStore`] is the capability set the registry needs from a
//! content-addressed store: enumerate reference names, peel a reference to
//! its commit, read a directory snapshot, and read file content.
//! [`GitStore`] implements it over a git repository and is the only type in
//! the crate that touches `git2`.
//!
//! A `GitStore` is opened per request and dropped at the end of it. Nothing
//! is cached, so every answer reflects the repository as it is right now.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`StoreError::NotARepo`]: The path cannot be opened as a repository
//! - [`StoreError::RefNotFound`]: Requested ref does not exist
//! - [`StoreError::ObjectNotFound`]: A tree or blob is missing
//! - [`StoreError::Unarchivable`]: An entry cannot be represented in an archive
//! - [`StoreError::Write`]: Writing serialized output failed
//!
//! Git permits arbitrary bytes in reference and entry names. Entry names are
//! carried as raw bytes; reference names that are not UTF-8 cannot be
//! version tags and are skipped during enumeration.
//!
//! # Example
//!
//! ```ignore
//! use modreg::git::{GitStore, ObjectStore};
//! use std::path::Path;
//!
//! let store = GitStore::open(Path::new("/srv/git/widget.git"))?;
//! for name in store.reference_names()? {
//!     println!("{name}");
//! }
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::types::{Oid, TreeId, TypeError};

/// Errors from object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path could not be opened as a git repository.
    #[error("not a git repository: {path}: {message}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
        /// Why opening failed
        message: String,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// A snapshot entry cannot be written as an archive member.
    #[error("cannot archive '{path}': {message}")]
    Unarchivable {
        /// Path of the entry within the snapshot (lossy)
        path: String,
        /// Why the archive writer rejected it
        message: String,
    },

    /// Writing serialized output failed (including a closed connection).
    #[error("write failed: {0}")]
    Write(std::io::Error),

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl StoreError {
    /// Create a StoreError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") {
                    StoreError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    StoreError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            _ => StoreError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    /// Whether this error means "no such reference" rather than a failure
    /// to read the store.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::RefNotFound { .. })
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        StoreError::Internal {
            message: err.to_string(),
        }
    }
}

/// The commit a version reference points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSnapshot {
    /// The commit's root directory snapshot
    pub tree: TreeId,
    /// Committer timestamp, seconds since the Unix epoch
    pub committed_at: i64,
}

/// What a directory snapshot entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A subdirectory (tree object).
    Directory,
    /// A regular file (blob object).
    File,
    /// A symbolic link; the blob holds the link target.
    Symlink,
    /// A link to a commit in another repository (submodule).
    Submodule,
}

/// One entry of a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File name within the directory, as stored (not necessarily UTF-8)
    pub name: Vec<u8>,
    /// Object the entry points at
    pub oid: Oid,
    /// Entry kind
    pub kind: EntryKind,
    /// Mode bits as recorded in the snapshot (e.g. `0o100755`)
    pub mode: u32,
}

/// Read-only capabilities of a content-addressed module store.
pub trait ObjectStore {
    /// Every reference name in the store, in the order the store lists them.
    fn reference_names(&self) -> Result<Vec<String>, StoreError>;

    /// Peel a reference (through annotated tags) to its commit.
    ///
    /// Fails with [`StoreError::RefNotFound`] if the reference is absent.
    fn peel_to_commit(&self, refname: &str) -> Result<CommitSnapshot, StoreError>;

    /// Entries of a directory snapshot, in the order the store reports them.
    fn read_tree(&self, tree: &Oid) -> Result<Vec<TreeEntry>, StoreError>;

    /// Full content of a blob.
    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, StoreError>;
}

/// Mode bits git records for symbolic links.
const GIT_FILEMODE_LINK: u32 = 0o120000;

/// A git repository opened for reading.
pub struct GitStore {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl GitStore {
    /// Open the repository at exactly `path`.
    ///
    /// Both bare repositories and working-tree checkouts are accepted.
    /// Unlike discovery, parent directories are not searched: the
    /// configured path must be the repository itself.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotARepo`] if `path` is not a readable repository
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let repo = git2::Repository::open(path).map_err(|e| StoreError::NotARepo {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;

        Ok(Self { repo })
    }

    fn to_git_oid(oid: &Oid) -> Result<git2::Oid, StoreError> {
        git2::Oid::from_str(oid.as_str()).map_err(|e| StoreError::from_git2(e, oid.as_str()))
    }

    fn from_git_oid(oid: git2::Oid) -> Result<Oid, StoreError> {
        Oid::new(oid.to_string()).map_err(StoreError::from)
    }
}

impl ObjectStore for GitStore {
    fn reference_names(&self) -> Result<Vec<String>, StoreError> {
        let references = self.repo.references().map_err(|e| StoreError::Internal {
            message: format!("cannot enumerate references: {}", e.message()),
        })?;

        // `References::names` panics on names that are not UTF-8, so read
        // the raw bytes of each reference instead.
        let mut names = Vec::new();
        for reference in references {
            let reference = reference.map_err(|e| StoreError::Internal {
                message: format!("cannot enumerate references: {}", e.message()),
            })?;
            match std::str::from_utf8(reference.name_bytes()) {
                Ok(name) => names.push(name.to_string()),
                Err(_) => debug!(
                    name = %String::from_utf8_lossy(reference.name_bytes()),
                    "skipping reference with non-UTF-8 name"
                ),
            }
        }

        Ok(names)
    }

    fn peel_to_commit(&self, refname: &str) -> Result<CommitSnapshot, StoreError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| StoreError::from_git2(e, refname))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|e| StoreError::from_git2(e, refname))?;

        let committed_at = commit.committer().when().seconds();
        Ok(CommitSnapshot {
            tree: TreeId::from(Self::from_git_oid(commit.tree_id())?),
            committed_at,
        })
    }

    fn read_tree(&self, tree: &Oid) -> Result<Vec<TreeEntry>, StoreError> {
        let tree_oid = Self::to_git_oid(tree)?;
        let git_tree = self
            .repo
            .find_tree(tree_oid)
            .map_err(|e| StoreError::from_git2(e, tree.as_str()))?;

        let mut entries = Vec::with_capacity(git_tree.len());
        for entry in git_tree.iter() {
            let name = entry.name_bytes();
            // Filemodes are small positive octal values; a negative one would
            // be a corrupt entry.
            let mode = u32::try_from(entry.filemode()).map_err(|_| StoreError::Internal {
                message: format!(
                    "invalid filemode for '{}' in {}",
                    String::from_utf8_lossy(name),
                    tree
                ),
            })?;

            let kind = match entry.kind() {
                Some(git2::ObjectType::Tree) => EntryKind::Directory,
                Some(git2::ObjectType::Blob) if mode == GIT_FILEMODE_LINK => EntryKind::Symlink,
                Some(git2::ObjectType::Blob) => EntryKind::File,
                Some(git2::ObjectType::Commit) => EntryKind::Submodule,
                other => {
                    return Err(StoreError::Internal {
                        message: format!(
                            "unexpected object type {:?} for '{}' in {}",
                            other,
                            String::from_utf8_lossy(name),
                            tree
                        ),
                    })
                }
            };

            entries.push(TreeEntry {
                name: name.to_vec(),
                oid: Self::from_git_oid(entry.id())?,
                kind,
                mode,
            });
        }

        Ok(entries)
    }

    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, StoreError> {
        let blob_oid = Self::to_git_oid(blob)?;
        let git_blob = self
            .repo
            .find_blob(blob_oid)
            .map_err(|e| StoreError::from_git2(e, blob.as_str()))?;

        Ok(git_blob.content().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod errors {
        use super::*;

        #[test]
        fn error_display_formatting() {
            let err = StoreError::RefNotFound {
                refname: "refs/tags/v1.0.0".into(),
            };
            assert_eq!(err.to_string(), "ref not found: refs/tags/v1.0.0");

            let err = StoreError::NotARepo {
                path: PathBuf::from("/nowhere"),
                message: "could not find repository".into(),
            };
            assert!(err.to_string().contains("/nowhere"));
        }

        #[test]
        fn not_found_maps_by_context() {
            let err = git2::Error::new(
                git2::ErrorCode::NotFound,
                git2::ErrorClass::Reference,
                "missing",
            );
            assert!(StoreError::from_git2(err, "refs/tags/v1.0.0").is_not_found());

            let err = git2::Error::new(
                git2::ErrorCode::NotFound,
                git2::ErrorClass::Odb,
                "missing",
            );
            assert!(matches!(
                StoreError::from_git2(err, "abc123"),
                StoreError::ObjectNotFound { .. }
            ));
        }

        #[test]
        fn other_codes_are_internal() {
            let err = git2::Error::new(
                git2::ErrorCode::GenericError,
                git2::ErrorClass::Os,
                "disk on fire",
            );
            let mapped = StoreError::from_git2(err, "refs/tags/v1.0.0");
            assert!(!mapped.is_not_found());
            assert!(mapped.to_string().contains("disk on fire"));
        }
    }

    #[test]
    fn open_missing_path_is_not_a_repo() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = GitStore::open(&dir.path().join("absent"));
        assert!(matches!(result, Err(StoreError::NotARepo { .. })));
    }
}
