//! WTT Store - Durable session data for tracked documents
//!
//! Stores each document's [`SessionStore`](wtt_core::SessionStore) as
//! versioned JSON in a hidden sidecar file, replaces it atomically on save,
//! and reconciles sessions a crashed process left open when loading.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod document;
pub mod error;
pub mod file;
pub mod persistence;
pub mod version;

pub use document::{DocumentRef, STORE_SUFFIX};
pub use error::{LoadIssue, PersistError, PersistResult};
pub use persistence::{load, reconcile, save, Loaded};
pub use version::SchemaVersion;
