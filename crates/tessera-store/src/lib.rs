//! Backing-store seams for the Tessera permission directory
//!
//! Two async trait seams cover everything the resolvers need from the
//! backing document store: read-only predicate queries over the policy
//! table (`PolicyStore`) and CRUD over principals and capability tokens
//! (`TokenStore`). Production deployments implement these against the real
//! document store; the in-memory implementations here back the test suite
//! and small single-process deployments.

pub mod memory;
pub mod policy;
pub mod token;

pub use memory::{MemoryPolicyStore, MemoryTokenStore};
pub use policy::PolicyStore;
pub use token::{TokenRequest, TokenStore};
