//! Permission resolution and reconciliation engine
//!
//! Given a role name or a user identity, computes, lazily creates, and
//! keeps synchronized the scoped capability tokens gating per-table access
//! to the backing document store, driven by the declarative role→table
//! policy rules.
//!
//! # Architecture
//!
//! - [`GroupPermissionResolver`] computes the role-wide token set for a
//!   role, cached per (role, filter) with a sliding TTL.
//! - [`UserPermissionResolver`] computes the identity-scoped token set for
//!   a user; never cached.
//! - [`PermissionAggregator`] runs both concurrently for a request and
//!   concatenates the results.
//!
//! All resolution is best-effort: each per-table branch suspends and fails
//! independently, failed branches are logged and dropped, and the entry
//! points return whatever subset succeeded.

pub mod aggregator;
pub mod cache;
pub mod group;
mod reconcile;
pub mod user;

pub use aggregator::PermissionAggregator;
pub use cache::DirectoryCache;
pub use group::GroupPermissionResolver;
pub use user::UserPermissionResolver;
