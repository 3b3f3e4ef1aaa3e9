//! Read-only queries over the declarative policy table
//!
//! Plain predicate reads against the backing store. Nothing is cached at
//! this layer; result caching happens above, in the directory.

use async_trait::async_trait;
use tessera_core::{DirectoryResult, PolicyRow};

/// Read-only view of the role→table policy rules and the table catalog
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// All table names in the backing store's catalog
    async fn list_tables(&self) -> DirectoryResult<Vec<String>>;

    /// Rows declared for a role (matched case-insensitively)
    async fn rows_for_role(&self, role: &str) -> DirectoryResult<Vec<PolicyRow>>;

    /// Rows declared for a table
    async fn rows_for_table(&self, table: &str) -> DirectoryResult<Vec<PolicyRow>>;

    /// Rows carrying an identity-scoped permission level, across all roles
    async fn id_scoped_rows(&self) -> DirectoryResult<Vec<PolicyRow>>;

    /// Distinct role names declared anywhere in the policy table, sorted
    async fn list_roles(&self) -> DirectoryResult<Vec<String>>;
}
