//! registry
//!
//! The module catalog: what versions a module has, and what each version
//! contains.
//!
//! # Architecture
//!
//! Both halves are written against [`crate::git::ObjectStore`] and borrow a
//! store for the duration of one request:
//!
//! - [`catalog`] turns version-shaped tag names into an ordered version list
//!   and resolves a version to its directory snapshot
//! - [`archive`] serializes a version's snapshot as a deterministic tar
//!   stream, optionally gzip-compressed
//!
//! # Invariants
//!
//! - Nothing is cached; every call re-reads the store
//! - The store is never written
//! - Archive bytes depend only on snapshot content and commit time

pub mod archive;
pub mod catalog;

pub use archive::ArchiveBuilder;
pub use catalog::VersionCatalog;
