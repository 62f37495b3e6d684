//! git::memory
//!
//! In-memory object store for deterministic testing.
//!
//! # Design
//!
//! `MemoryStore` implements [`ObjectStore`] over plain maps so that version
//! enumeration and archive generation can be tested without creating git
//! repositories. Object ids are synthetic but well-formed, and failures can
//! be injected per capability.
//!
//! # Example
//!
//! ```
//! use modreg::git::memory::MemoryStore;
//! use modreg::git::ObjectStore;
//!
//! let mut store = MemoryStore::new();
//! let readme = store.add_blob(b"# Widget\n");
//! let root = store.add_tree(vec![MemoryStore::file("README.md", &readme, 0o100644)]);
//! store.add_tag("refs/tags/v1.0.0", &root, 1_700_000_000);
//!
//! assert_eq!(store.reference_names().unwrap(), vec!["refs/tags/v1.0.0"]);
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};

use super::interface::{CommitSnapshot, EntryKind, ObjectStore, StoreError, TreeEntry};
use crate::core::types::{Oid, TreeId};

/// Which capability should fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailOn {
    /// Reference enumeration cannot start.
    Enumerate,
    /// Reading this object (tree or blob) fails.
    Object(Oid),
}

/// In-memory [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Reference names in insertion order, with the commit they peel to.
    refs: Vec<(String, CommitSnapshot)>,
    trees: HashMap<Oid, Vec<TreeEntry>>,
    blobs: HashMap<Oid, Vec<u8>>,
    failures: HashSet<FailOn>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_oid(&mut self) -> Oid {
        self.next_id += 1;
        // 40 hex digits, unique per store
        match Oid::new(format!("{:040x}", self.next_id)) {
            Ok(oid) => oid,
            Err(e) => unreachable!("synthetic oid is always valid: {e}"),
        }
    }

    /// Store a blob and return its id.
    pub fn add_blob(&mut self, content: &[u8]) -> Oid {
        let oid = self.next_oid();
        self.blobs.insert(oid.clone(), content.to_vec());
        oid
    }

    /// Store a tree with entries in the given order and return its id.
    pub fn add_tree(&mut self, entries: Vec<TreeEntry>) -> Oid {
        let oid = self.next_oid();
        self.trees.insert(oid.clone(), entries);
        oid
    }

    /// Point a reference at a new commit of `tree`.
    pub fn add_tag(&mut self, refname: &str, tree: &Oid, committed_at: i64) {
        self.refs.push((
            refname.to_string(),
            CommitSnapshot {
                tree: TreeId::from(tree.clone()),
                committed_at,
            },
        ));
    }

    /// Make a capability fail with an internal error.
    pub fn fail_on(&mut self, failure: FailOn) {
        self.failures.insert(failure);
    }

    fn check_object(&self, oid: &Oid) -> Result<(), StoreError> {
        if self.failures.contains(&FailOn::Object(oid.clone())) {
            return Err(StoreError::Internal {
                message: format!("injected read failure for {oid}"),
            });
        }
        Ok(())
    }

    /// A regular file entry.
    pub fn file(name: impl AsRef<[u8]>, oid: &Oid, mode: u32) -> TreeEntry {
        Self::entry(name, oid, EntryKind::File, mode)
    }

    /// A subdirectory entry.
    pub fn dir(name: impl AsRef<[u8]>, oid: &Oid) -> TreeEntry {
        Self::entry(name, oid, EntryKind::Directory, 0o040000)
    }

    /// A symbolic link entry whose target is stored in blob `oid`.
    pub fn symlink(name: impl AsRef<[u8]>, oid: &Oid) -> TreeEntry {
        Self::entry(name, oid, EntryKind::Symlink, 0o120000)
    }

    /// A submodule entry pointing at a commit in another repository.
    pub fn submodule(name: impl AsRef<[u8]>, commit: &Oid) -> TreeEntry {
        Self::entry(name, commit, EntryKind::Submodule, 0o160000)
    }

    fn entry(name: impl AsRef<[u8]>, oid: &Oid, kind: EntryKind, mode: u32) -> TreeEntry {
        TreeEntry {
            name: name.as_ref().to_vec(),
            oid: oid.clone(),
            kind,
            mode,
        }
    }
}

impl ObjectStore for MemoryStore {
    fn reference_names(&self) -> Result<Vec<String>, StoreError> {
        if self.failures.contains(&FailOn::Enumerate) {
            return Err(StoreError::Internal {
                message: "injected enumeration failure".into(),
            });
        }
        // Name order, like a packed-refs listing.
        let names: BTreeSet<&str> = self.refs.iter().map(|(n, _)| n.as_str()).collect();
        Ok(names.into_iter().map(str::to_string).collect())
    }

    fn peel_to_commit(&self, refname: &str) -> Result<CommitSnapshot, StoreError> {
        self.refs
            .iter()
            .rev()
            .find(|(name, _)| name == refname)
            .map(|(_, snapshot)| snapshot.clone())
            .ok_or_else(|| StoreError::RefNotFound {
                refname: refname.to_string(),
            })
    }

    fn read_tree(&self, tree: &Oid) -> Result<Vec<TreeEntry>, StoreError> {
        self.check_object(tree)?;
        self.trees
            .get(tree)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound {
                oid: tree.to_string(),
            })
    }

    fn read_blob(&self, blob: &Oid) -> Result<Vec<u8>, StoreError> {
        self.check_object(blob)?;
        self.blobs
            .get(blob)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound {
                oid: blob.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_listed_in_name_order() {
        let mut store = MemoryStore::new();
        let tree = store.add_tree(vec![]);
        store.add_tag("refs/tags/v2.0.0", &tree, 0);
        store.add_tag("refs/heads/main", &tree, 0);
        store.add_tag("refs/tags/v1.0.0", &tree, 0);

        assert_eq!(
            store.reference_names().unwrap(),
            vec!["refs/heads/main", "refs/tags/v1.0.0", "refs/tags/v2.0.0"]
        );
    }

    #[test]
    fn retagging_moves_reference() {
        let mut store = MemoryStore::new();
        let first = store.add_tree(vec![]);
        let second = store.add_tree(vec![]);
        store.add_tag("refs/tags/v1.0.0", &first, 0);
        store.add_tag("refs/tags/v1.0.0", &second, 0);

        let snapshot = store.peel_to_commit("refs/tags/v1.0.0").unwrap();
        assert_eq!(snapshot.tree.oid(), &second);
        assert_eq!(store.reference_names().unwrap().len(), 1);
    }

    #[test]
    fn missing_ref_is_not_found() {
        let store = MemoryStore::new();
        assert!(store
            .peel_to_commit("refs/tags/v1.0.0")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn injected_object_failure() {
        let mut store = MemoryStore::new();
        let blob = store.add_blob(b"x");
        store.fail_on(FailOn::Object(blob.clone()));
        assert!(matches!(
            store.read_blob(&blob),
            Err(StoreError::Internal { .. })
        ));
    }
}
