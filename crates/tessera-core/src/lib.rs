//! Core data model for the Tessera permission directory
//!
//! This crate defines the shared vocabulary of the directory engine: policy
//! rows, subjects, capability tokens, table filters, the unified error type,
//! and the engine configuration. It contains no I/O; the store seams live in
//! `tessera-store` and the resolution logic in `tessera-directory`.

pub mod config;
pub mod error;
pub mod types;

pub use config::DirectoryConfig;
pub use error::{DirectoryError, DirectoryResult};
pub use types::{
    AccessMode, CapabilityToken, PermissionLevel, PolicyRow, SubjectKey, TableFilter, TokenIdentity,
};
