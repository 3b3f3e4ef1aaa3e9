//! Identity-scoped permission resolution
//!
//! Resolves the tokens a single user holds on identity-partitioned tables.
//! Deliberately uncached: the fan-out is small (one branch per
//! identity-scoped policy row) and per-user results would crowd out the
//! role-wide entries. Output is deduplicated by structural token identity,
//! since concurrent branches can surface the same stored token more than
//! once.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tessera_core::{AccessMode, CapabilityToken, DirectoryConfig, SubjectKey, TableFilter};
use tessera_store::{PolicyStore, TokenRequest, TokenStore};

use crate::reconcile::{get_or_create, reconcile};

/// Resolves the identity-scoped token set for a user
pub struct UserPermissionResolver {
    policy: Arc<dyn PolicyStore>,
    tokens: Arc<dyn TokenStore>,
    config: DirectoryConfig,
}

impl UserPermissionResolver {
    /// Create a resolver over the given stores
    pub fn new(
        policy: Arc<dyn PolicyStore>,
        tokens: Arc<dyn TokenStore>,
        config: DirectoryConfig,
    ) -> Self {
        Self {
            policy,
            tokens,
            config,
        }
    }

    /// Resolve the identity-scoped tokens for a user in a group
    ///
    /// Admins receive ReadWrite on every identity-partitioned table; other
    /// users only on the rows declared for their own group. Partition scope
    /// is always the requesting user id. Best-effort, like the group path.
    pub async fn resolve(
        &self,
        user_id: &str,
        group: &str,
        filter: &TableFilter,
    ) -> Vec<CapabilityToken> {
        let subject = SubjectKey::user(user_id);

        if let Err(error) = self.tokens.ensure_principal(&subject).await {
            tracing::warn!(subject = %subject, %error, "Failed to ensure principal");
        }

        let rows = match self.policy.id_scoped_rows().await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(%error, "Failed to query identity-scoped policy rows");
                return Vec::new();
            }
        };

        let is_admin = self.config.is_admin(group);
        let branches = rows
            .into_iter()
            .filter(|row| filter.permits(&row.table))
            .map(|row| {
                let subject = subject.clone();
                async move {
                    if is_admin {
                        let request = TokenRequest::identity_scoped(
                            subject,
                            &row.table,
                            AccessMode::ReadWrite,
                            user_id,
                        );
                        return get_or_create(self.tokens.as_ref(), request)
                            .await
                            .map(Some);
                    }
                    // Only the matching role's rows apply to this user
                    if !row.role_matches(group) {
                        return Ok(None);
                    }
                    let Some(mode) = row.level.desired_mode() else {
                        return Ok(None);
                    };
                    let request =
                        TokenRequest::identity_scoped(subject, &row.table, mode, user_id);
                    reconcile(self.tokens.as_ref(), request).await.map(Some)
                }
            });

        let mut seen = HashSet::new();
        let mut granted = Vec::new();
        for result in join_all(branches).await {
            match result {
                Ok(Some(token)) => {
                    if seen.insert(token.dedup_key()) {
                        granted.push(token);
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(subject = %subject, %error, "Dropping failed token branch");
                }
            }
        }
        granted
    }
}
