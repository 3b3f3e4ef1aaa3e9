//! Principal and capability-token CRUD
//!
//! The store owns token identity: resource ids, etags, self links, and
//! expiry stamps are minted by the implementation, not by callers. The
//! engine never deletes tokens; deletion is an external administrative
//! concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_core::{AccessMode, CapabilityToken, DirectoryResult, SubjectKey};

/// Desired shape of a token to create or replace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Subject the token is issued to
    pub subject: SubjectKey,
    /// Table the token gates
    pub table: String,
    /// Access mode to grant
    pub mode: AccessMode,
    /// Partition the grant is restricted to
    pub partition_scope: String,
}

impl TokenRequest {
    /// Request a role-wide token, partitioned by the table itself
    pub fn role_wide(subject: SubjectKey, table: impl Into<String>, mode: AccessMode) -> Self {
        let table = table.into();
        Self {
            subject,
            partition_scope: table.clone(),
            table,
            mode,
        }
    }

    /// Request an identity-scoped token, partitioned by a user id
    pub fn identity_scoped(
        subject: SubjectKey,
        table: impl Into<String>,
        mode: AccessMode,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            subject,
            table: table.into(),
            mode,
            partition_scope: user_id.into(),
        }
    }
}

/// CRUD over per-subject capability tokens and principal records
///
/// At most one stored token exists per (subject, table); implementations
/// uphold that invariant on create and replace.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Ensure a principal record exists for a subject
    ///
    /// Idempotent: an already-existing principal is not an error.
    async fn ensure_principal(&self, subject: &SubjectKey) -> DirectoryResult<()>;

    /// Look up the stored token for a (subject, table) pair
    ///
    /// `Ok(None)` means no token exists — a normal outcome, not an error.
    async fn find_token(
        &self,
        subject: &SubjectKey,
        table: &str,
    ) -> DirectoryResult<Option<CapabilityToken>>;

    /// Create a new token for a (subject, table) pair
    async fn create_token(&self, request: TokenRequest) -> DirectoryResult<CapabilityToken>;

    /// Replace the stored token for a (subject, table) pair
    ///
    /// Used when the desired mode diverges from the stored mode. The
    /// replacement keeps the (subject, table) slot and re-stamps identity
    /// fields (etag, last modified, expiry).
    async fn replace_token(
        &self,
        existing: &CapabilityToken,
        request: TokenRequest,
    ) -> DirectoryResult<CapabilityToken>;
}
