//! core
//!
//! Core domain types and configuration for the registry.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Oid, TreeId, ModuleCoordinate
//! - [`version`] - Version tag grammar and precedence
//! - [`modules`] - Configured module locations and coordinate lookup
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Nothing here touches a repository; all of it is testable without git

pub mod config;
pub mod modules;
pub mod types;
pub mod version;
