//! Engine configuration
//!
//! Plain struct with defaults; loading from files or the environment is the
//! embedding application's concern.

use std::time::Duration;

/// Configuration for the permission directory
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Sliding time-to-live for cached resolution results
    pub cache_ttl: Duration,

    /// Lifetime stamped on newly created capability tokens
    pub token_ttl: Duration,

    /// Role granted catalog-wide access (compared case-insensitively)
    pub admin_role: String,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(20 * 60),
            token_ttl: Duration::from_secs(60 * 60),
            admin_role: "admin".to_string(),
        }
    }
}

impl DirectoryConfig {
    /// Whether a role name is the admin role
    pub fn is_admin(&self, role: &str) -> bool {
        role.eq_ignore_ascii_case(&self.admin_role)
    }
}
