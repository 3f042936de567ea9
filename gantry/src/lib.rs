//! Gantry is the incremental execution core of a build tool.
//!
//! Given a set of resolved build rules, a frozen configuration and a requested
//! target, the engine decides which rules must re-run, runs them in dependency
//! order, and persists per-rule fingerprint records so the next invocation can
//! skip unchanged work. A symmetric clean traversal removes previously
//! produced artifacts.
//!
//! Rule declaration and name resolution happen upstream; rules arrive here
//! with fully resolved target identifiers. See [`Executor`] for the two
//! user-level entry points.

#![deny(clippy::dbg_macro)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![warn(rust_2018_idioms)]

pub use executor::Executor;

pub mod core;
mod executor;
pub mod handlers;
mod internal;
pub mod ops;
pub mod resolver;
pub mod store;

/// Directory, relative to a project root, conventionally holding the store.
pub const DEFAULT_STORE_DIR_NAME: &str = ".gantry";
/// File name of the fingerprint store database.
///
/// The name carries a format version. A new database format should bump it to
/// `.v2.redb` and simply abandon old files; the store is a cache and is never
/// migrated.
pub const STORE_FILE_NAME: &str = "fingerprints.v1.redb";
