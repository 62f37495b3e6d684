//! git
//!
//! Single interface for all object store access.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Version enumeration and
//! archive generation are written against the [`ObjectStore`] trait; the
//! git2-backed [`GitStore`] is its production implementation. No other
//! module should import `git2`.
//!
//! # Responsibilities
//!
//! - Opening a module repository (bare or not) for reading
//! - Reference name enumeration
//! - Peeling references through annotated tags to commits
//! - Reading trees and blobs
//!
//! # Invariants
//!
//! - Access is strictly read-only
//! - Handles are request-scoped; nothing is cached between opens
//! - All operations return strong types (Oid, TreeId)

mod interface;
pub mod memory;

pub use interface::{
    CommitSnapshot, EntryKind, GitStore, ObjectStore, StoreError, TreeEntry,
};
