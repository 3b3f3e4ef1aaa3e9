//! Role-wide permission resolution
//!
//! Resolves the capability tokens a whole role holds, fanning out one
//! reconciliation branch per applicable table and joining them all before
//! returning. Results are cached per (role, filter) under a sliding TTL.
//! Failed branches are logged and dropped; resolution is best-effort and
//! never propagates a branch failure to the caller.

use futures::future::join_all;
use std::sync::Arc;
use tessera_core::{
    AccessMode, CapabilityToken, DirectoryConfig, DirectoryResult, SubjectKey, TableFilter,
};
use tessera_store::{PolicyStore, TokenRequest, TokenStore};

use crate::cache::DirectoryCache;
use crate::reconcile::{get_or_create, reconcile};

/// Resolves the role-wide token set for a role name
pub struct GroupPermissionResolver {
    policy: Arc<dyn PolicyStore>,
    tokens: Arc<dyn TokenStore>,
    cache: Arc<DirectoryCache<Vec<CapabilityToken>>>,
    config: DirectoryConfig,
}

impl GroupPermissionResolver {
    /// Create a resolver over the given stores and shared cache
    pub fn new(
        policy: Arc<dyn PolicyStore>,
        tokens: Arc<dyn TokenStore>,
        cache: Arc<DirectoryCache<Vec<CapabilityToken>>>,
        config: DirectoryConfig,
    ) -> Self {
        Self {
            policy,
            tokens,
            cache,
            config,
        }
    }

    /// Resolve the role-wide tokens for a role, creating or reconciling
    /// stored tokens as needed
    ///
    /// Best-effort: branches that fail against the backing store are logged
    /// and dropped, so the returned list is whatever subset succeeded.
    pub async fn resolve(&self, group: &str, filter: &TableFilter) -> Vec<CapabilityToken> {
        let subject = SubjectKey::role(group);
        let cache_key = format!("{}|{}", subject, filter.canonical());

        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::debug!(subject = %subject, "Serving group permissions from cache");
            return cached;
        }

        if let Err(error) = self.tokens.ensure_principal(&subject).await {
            tracing::warn!(subject = %subject, %error, "Failed to ensure principal");
        }

        let results = if self.config.is_admin(group) {
            self.resolve_admin(&subject, filter).await
        } else {
            self.resolve_role(&subject, group, filter).await
        };

        let mut granted = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(Some(token)) => granted.push(token),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(subject = %subject, %error, "Dropping failed token branch");
                }
            }
        }

        self.cache
            .insert(cache_key, granted.clone(), self.config.cache_ttl);
        granted
    }

    /// Admin path: every catalog table except those owning identity-scoped
    /// rows, granted ReadWrite without reconciling existing tokens
    async fn resolve_admin(
        &self,
        subject: &SubjectKey,
        filter: &TableFilter,
    ) -> Vec<DirectoryResult<Option<CapabilityToken>>> {
        let tables = match self.policy.list_tables().await {
            Ok(tables) => tables,
            Err(error) => {
                tracing::warn!(%error, "Failed to list table catalog");
                return Vec::new();
            }
        };

        let branches = tables
            .into_iter()
            .filter(|table| filter.permits(table))
            .map(|table| {
                let subject = subject.clone();
                async move {
                    // Tables owning identity-scoped rows stay identity-only,
                    // even for admins
                    let rows = self.policy.rows_for_table(&table).await?;
                    if rows.iter().any(|row| row.level.is_identity_scoped()) {
                        return Ok(None);
                    }
                    let request = TokenRequest::role_wide(subject, &table, AccessMode::ReadWrite);
                    get_or_create(self.tokens.as_ref(), request)
                        .await
                        .map(Some)
                }
            });

        join_all(branches).await
    }

    /// Non-admin path: one reconciled token per role-wide policy row
    async fn resolve_role(
        &self,
        subject: &SubjectKey,
        group: &str,
        filter: &TableFilter,
    ) -> Vec<DirectoryResult<Option<CapabilityToken>>> {
        let rows = match self.policy.rows_for_role(group).await {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(group, %error, "Failed to query policy rows");
                return Vec::new();
            }
        };

        let branches = rows
            .into_iter()
            .filter(|row| row.level.grants_role_wide() && filter.permits(&row.table))
            .map(|row| {
                let subject = subject.clone();
                async move {
                    // grants_role_wide guarantees a mode
                    let Some(mode) = row.level.desired_mode() else {
                        return Ok(None);
                    };
                    let request = TokenRequest::role_wide(subject, &row.table, mode);
                    reconcile(self.tokens.as_ref(), request).await.map(Some)
                }
            });

        join_all(branches).await
    }
}
