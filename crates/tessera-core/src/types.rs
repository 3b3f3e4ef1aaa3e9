//! Policy rows, subjects, and capability tokens
//!
//! The permission model has two layers: declarative `PolicyRow` rules owned
//! by an external policy table, and `CapabilityToken` grants materialized
//! from those rules in the backing document store. A token is scoped to one
//! table and partitioned either by the table itself (role-wide) or by a
//! user id (identity-scoped).

use serde::{Deserialize, Serialize};

/// Permission level declared by a policy row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionLevel {
    /// No access
    None,
    /// Role-wide read access
    Read,
    /// Role-wide read/write access
    ReadWrite,
    /// Identity-scoped read access (partitioned by user id)
    IdRead,
    /// Identity-scoped read/write access (partitioned by user id)
    IdReadWrite,
}

impl PermissionLevel {
    /// Whether this level yields a role-wide token
    pub fn grants_role_wide(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Whether this level yields an identity-scoped token
    pub fn is_identity_scoped(&self) -> bool {
        matches!(self, Self::IdRead | Self::IdReadWrite)
    }

    /// The token mode this level resolves to, if it grants anything
    pub fn desired_mode(&self) -> Option<AccessMode> {
        match self {
            Self::None => None,
            Self::Read | Self::IdRead => Some(AccessMode::ReadOnly),
            Self::ReadWrite | Self::IdReadWrite => Some(AccessMode::ReadWrite),
        }
    }
}

/// Access mode carried by a capability token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessMode {
    /// Read-only access to the table
    ReadOnly,
    /// Read/write access to the table
    ReadWrite,
}

/// Declarative rule mapping a role and table to a permission level
///
/// Externally owned and read-only from the engine's perspective. At most one
/// row per (table, role) is assumed; duplicates are unguarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRow {
    /// Table the rule applies to
    pub table: String,
    /// Role the rule applies to
    pub role: String,
    /// Declared permission level
    pub level: PermissionLevel,
}

impl PolicyRow {
    /// Create a new policy row
    pub fn new(table: impl Into<String>, role: impl Into<String>, level: PermissionLevel) -> Self {
        Self {
            table: table.into(),
            role: role.into(),
            level,
        }
    }

    /// Whether this row's role matches a name, case-insensitively
    pub fn role_matches(&self, role: &str) -> bool {
        self.role.eq_ignore_ascii_case(role)
    }
}

/// Principal a capability token is issued to
///
/// Role names and user ids share one storage key namespace in the backing
/// store; the tagged union keeps the two resolution paths explicit. Role
/// names are normalized to lowercase on construction so lookups are
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKey {
    /// A role name, shared by all members of the role
    Role(String),
    /// A single user id
    User(String),
}

impl SubjectKey {
    /// Create a role subject (normalized to lowercase)
    pub fn role(name: impl AsRef<str>) -> Self {
        Self::Role(name.as_ref().to_ascii_lowercase())
    }

    /// Create a user subject
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    /// The raw key this subject occupies in the store's principal namespace
    pub fn storage_key(&self) -> &str {
        match self {
            Self::Role(name) => name,
            Self::User(id) => id,
        }
    }
}

impl std::fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Role(name) => write!(f, "role:{}", name),
            Self::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Scoped, time-bound grant of access to one table for one subject
///
/// `partition_scope` is the table name for role-wide tokens and the
/// requesting user id for identity-scoped tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityToken {
    /// Subject this token is granted to
    pub subject: SubjectKey,
    /// Table this token gates
    pub table: String,
    /// Access mode granted
    pub mode: AccessMode,
    /// Backing-store resource id
    pub resource_id: String,
    /// URI of the gated resource in the backing store
    pub resource_uri: String,
    /// Partition the grant is restricted to
    pub partition_scope: String,
    /// Backing-store self link
    pub self_link: String,
    /// Backing-store entity tag
    pub etag: String,
    /// Last modification timestamp (epoch seconds)
    pub last_modified: u64,
    /// Expiry timestamp (epoch seconds)
    pub expires_at: u64,
}

impl CapabilityToken {
    /// Structural identity used to deduplicate tokens
    ///
    /// Concurrent fan-out can yield distinct in-memory representations of
    /// the same physical token; two tokens with equal identity are the same
    /// stored grant.
    pub fn dedup_key(&self) -> TokenIdentity {
        TokenIdentity {
            etag: self.etag.clone(),
            resource_id: self.resource_id.clone(),
            resource_uri: self.resource_uri.clone(),
            last_modified: self.last_modified,
            mode: self.mode,
            self_link: self.self_link.clone(),
        }
    }
}

/// Structural identity of a stored token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenIdentity {
    /// Backing-store entity tag
    pub etag: String,
    /// Backing-store resource id
    pub resource_id: String,
    /// URI of the gated resource
    pub resource_uri: String,
    /// Last modification timestamp
    pub last_modified: u64,
    /// Access mode granted
    pub mode: AccessMode,
    /// Backing-store self link
    pub self_link: String,
}

/// Allow-list of table names; empty means unrestricted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFilter(Vec<String>);

impl TableFilter {
    /// Unrestricted filter
    pub fn all() -> Self {
        Self(Vec::new())
    }

    /// Filter restricted to the given tables
    pub fn only(tables: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(tables.into_iter().map(Into::into).collect())
    }

    /// Whether the filter places no restriction
    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a table passes the filter
    pub fn permits(&self, table: &str) -> bool {
        self.0.is_empty() || self.0.iter().any(|t| t == table)
    }

    /// Sorted, deduplicated rendering for use in cache keys
    pub fn canonical(&self) -> String {
        let mut tables: Vec<&str> = self.0.iter().map(String::as_str).collect();
        tables.sort_unstable();
        tables.dedup();
        tables.join(",")
    }
}
