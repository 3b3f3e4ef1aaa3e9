//! Request-level aggregation of the two resolution paths
//!
//! One aggregator instance owns the shared cache and both resolvers; the
//! embedding application constructs it once over its store handles and
//! calls `resolve_all` per request.

use std::sync::Arc;
use tessera_core::{CapabilityToken, DirectoryConfig, TableFilter};
use tessera_store::{PolicyStore, TokenStore};

use crate::cache::DirectoryCache;
use crate::group::GroupPermissionResolver;
use crate::user::UserPermissionResolver;

const ROLE_CATALOG_KEY: &str = "role-catalog";

/// Merges role-wide and identity-scoped resolution for a request
pub struct PermissionAggregator {
    policy: Arc<dyn PolicyStore>,
    groups: GroupPermissionResolver,
    users: UserPermissionResolver,
    catalog_cache: DirectoryCache<Vec<String>>,
    config: DirectoryConfig,
}

impl PermissionAggregator {
    /// Create an aggregator over the given stores
    pub fn new(
        policy: Arc<dyn PolicyStore>,
        tokens: Arc<dyn TokenStore>,
        config: DirectoryConfig,
    ) -> Self {
        let cache = Arc::new(DirectoryCache::new());
        Self {
            groups: GroupPermissionResolver::new(
                Arc::clone(&policy),
                Arc::clone(&tokens),
                cache,
                config.clone(),
            ),
            users: UserPermissionResolver::new(
                Arc::clone(&policy),
                Arc::clone(&tokens),
                config.clone(),
            ),
            policy,
            catalog_cache: DirectoryCache::new(),
            config,
        }
    }

    /// Resolve every token a request's user holds: the role-wide set for
    /// their group plus their identity-scoped set
    ///
    /// The two sets are computed concurrently and concatenated; they are
    /// structurally disjoint by partition scope, so no cross-set
    /// deduplication is needed.
    pub async fn resolve_all(
        &self,
        user_id: &str,
        group: &str,
        filter: &TableFilter,
    ) -> Vec<CapabilityToken> {
        let (mut group_tokens, user_tokens) = tokio::join!(
            self.groups.resolve(group, filter),
            self.users.resolve(user_id, group, filter),
        );
        group_tokens.extend(user_tokens);
        group_tokens
    }

    /// Distinct role names in the policy table, sorted, cached under the
    /// same sliding TTL as group results
    pub async fn list_roles(&self) -> Vec<String> {
        if let Some(cached) = self.catalog_cache.get(ROLE_CATALOG_KEY) {
            return cached;
        }
        let roles = match self.policy.list_roles().await {
            Ok(roles) => roles,
            Err(error) => {
                tracing::warn!(%error, "Failed to list role catalog");
                return Vec::new();
            }
        };
        self.catalog_cache
            .insert(ROLE_CATALOG_KEY, roles.clone(), self.config.cache_ttl);
        roles
    }
}
