//! modreg - a module registry served from git tags
//!
//! modreg answers the module registry protocol for a configured set of
//! modules, each backed by one git repository. Version tags (`v1.2.0`) are
//! the versions; the tagged tree is the module content, served as a
//! deterministic gzip-compressed tar archive.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, loads config, serves)
//! - [`server`] - HTTP routing, response shapes, listeners
//! - [`registry`] - Version catalog and archive generation
//! - [`core`] - Domain types, version grammar, configuration
//! - [`git`] - Single interface for all Git access
//!
//! # Correctness Invariants
//!
//! 1. Repositories are only ever read, never written
//! 2. Every request re-reads current tags; nothing is cached
//! 3. An archive download is served only for the version's current tree
//! 4. Storage paths never appear in client responses

pub mod cli;
pub mod core;
pub mod git;
pub mod registry;
pub mod server;
