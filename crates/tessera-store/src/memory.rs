//! In-memory backing store
//!
//! Single-process implementations of the store seams, used by the test
//! suite and by small deployments that do not need an external document
//! store. The token store mints resource ids, etags, and self links the way
//! a document store would, and can inject failures per table so callers can
//! exercise partial-success paths.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tessera_core::{CapabilityToken, DirectoryError, DirectoryResult, PolicyRow, SubjectKey};

use crate::policy::PolicyStore;
use crate::token::{TokenRequest, TokenStore};

fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// In-memory policy table and catalog
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    inner: RwLock<PolicyInner>,
    queries: AtomicUsize,
}

#[derive(Debug, Default)]
struct PolicyInner {
    tables: Vec<String>,
    rows: Vec<PolicyRow>,
}

impl MemoryPolicyStore {
    /// Create an empty policy store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with rows; row tables join the catalog
    pub fn with_rows(rows: impl IntoIterator<Item = PolicyRow>) -> Self {
        let store = Self::new();
        for row in rows {
            store.insert_row(row);
        }
        store
    }

    /// Register a catalog table that may have no policy rows
    pub fn add_table(&self, table: impl Into<String>) {
        let table = table.into();
        let mut inner = self.inner.write();
        if !inner.tables.contains(&table) {
            inner.tables.push(table);
        }
    }

    /// Insert a policy row, registering its table in the catalog
    pub fn insert_row(&self, row: PolicyRow) {
        let mut inner = self.inner.write();
        if !inner.tables.contains(&row.table) {
            inner.tables.push(row.table.clone());
        }
        inner.rows.push(row);
    }

    /// Number of queries served since construction
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn list_tables(&self) -> DirectoryResult<Vec<String>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self.inner.read().tables.clone())
    }

    async fn rows_for_role(&self, role: &str) -> DirectoryResult<Vec<PolicyRow>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .inner
            .read()
            .rows
            .iter()
            .filter(|row| row.role_matches(role))
            .cloned()
            .collect())
    }

    async fn rows_for_table(&self, table: &str) -> DirectoryResult<Vec<PolicyRow>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .inner
            .read()
            .rows
            .iter()
            .filter(|row| row.table == table)
            .cloned()
            .collect())
    }

    async fn id_scoped_rows(&self) -> DirectoryResult<Vec<PolicyRow>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .inner
            .read()
            .rows
            .iter()
            .filter(|row| row.level.is_identity_scoped())
            .cloned()
            .collect())
    }

    async fn list_roles(&self) -> DirectoryResult<Vec<String>> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let mut roles: Vec<String> = self
            .inner
            .read()
            .rows
            .iter()
            .map(|row| row.role.to_ascii_lowercase())
            .collect();
        roles.sort_unstable();
        roles.dedup();
        Ok(roles)
    }
}

/// In-memory principal and token store with failure injection
#[derive(Debug)]
pub struct MemoryTokenStore {
    inner: RwLock<TokenInner>,
    token_ttl: Duration,
    writes: AtomicUsize,
    reads: AtomicUsize,
}

#[derive(Debug, Default)]
struct TokenInner {
    principals: HashSet<SubjectKey>,
    tokens: HashMap<(SubjectKey, String), CapabilityToken>,
    failing_tables: HashSet<String>,
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTokenStore {
    /// Create a token store with a one-hour token lifetime
    pub fn new() -> Self {
        Self::with_token_ttl(Duration::from_secs(60 * 60))
    }

    /// Create a token store with an explicit token lifetime
    pub fn with_token_ttl(token_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(TokenInner::default()),
            token_ttl,
            writes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    /// Make create/replace fail for one table
    pub fn fail_table(&self, table: impl Into<String>) {
        self.inner.write().failing_tables.insert(table.into());
    }

    /// Number of token writes (create + replace) since construction
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of token reads since construction
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Whether a principal record exists
    pub fn has_principal(&self, subject: &SubjectKey) -> bool {
        self.inner.read().principals.contains(subject)
    }

    /// Snapshot of all stored tokens
    pub fn stored_tokens(&self) -> Vec<CapabilityToken> {
        self.inner.read().tokens.values().cloned().collect()
    }

    fn mint(&self, request: &TokenRequest, now: u64) -> CapabilityToken {
        let resource_id = uuid::Uuid::new_v4().to_string();
        CapabilityToken {
            resource_uri: format!("colls/{}", request.table),
            self_link: format!(
                "principals/{}/tokens/{}",
                request.subject.storage_key(),
                resource_id
            ),
            resource_id,
            subject: request.subject.clone(),
            table: request.table.clone(),
            mode: request.mode,
            partition_scope: request.partition_scope.clone(),
            etag: format!("\"{}\"", uuid::Uuid::new_v4()),
            last_modified: now,
            expires_at: now + self.token_ttl.as_secs(),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn ensure_principal(&self, subject: &SubjectKey) -> DirectoryResult<()> {
        // Insert is a no-op when the principal already exists
        self.inner.write().principals.insert(subject.clone());
        Ok(())
    }

    async fn find_token(
        &self,
        subject: &SubjectKey,
        table: &str,
    ) -> DirectoryResult<Option<CapabilityToken>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .inner
            .read()
            .tokens
            .get(&(subject.clone(), table.to_string()))
            .cloned())
    }

    async fn create_token(&self, request: TokenRequest) -> DirectoryResult<CapabilityToken> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let now = now_epoch_secs();
        let mut inner = self.inner.write();
        if inner.failing_tables.contains(&request.table) {
            return Err(DirectoryError::store(format!(
                "create failed for table {}",
                request.table
            )));
        }
        let token = self.mint(&request, now);
        tracing::debug!(
            subject = %token.subject,
            table = %token.table,
            mode = ?token.mode,
            "Created capability token"
        );
        inner
            .tokens
            .insert((request.subject, request.table), token.clone());
        Ok(token)
    }

    async fn replace_token(
        &self,
        existing: &CapabilityToken,
        request: TokenRequest,
    ) -> DirectoryResult<CapabilityToken> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let now = now_epoch_secs();
        let mut inner = self.inner.write();
        if inner.failing_tables.contains(&request.table) {
            return Err(DirectoryError::store(format!(
                "replace failed for table {}",
                request.table
            )));
        }
        let slot = (existing.subject.clone(), existing.table.clone());
        if !inner.tokens.contains_key(&slot) {
            return Err(DirectoryError::not_found(format!(
                "no token for {} on {}",
                existing.subject, existing.table
            )));
        }
        // Replacement keeps the resource id but re-stamps mode, etag, and times
        let mut token = self.mint(&request, now);
        token.resource_id = existing.resource_id.clone();
        token.self_link = existing.self_link.clone();
        tracing::debug!(
            subject = %token.subject,
            table = %token.table,
            old_mode = ?existing.mode,
            new_mode = ?token.mode,
            "Replaced capability token"
        );
        inner.tokens.insert(slot, token.clone());
        Ok(token)
    }
}
