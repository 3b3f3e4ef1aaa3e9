//! End-to-end resolution flows over the in-memory stores

use std::sync::Arc;
use std::time::Duration;

use tessera_core::{
    AccessMode, CapabilityToken, DirectoryConfig, PermissionLevel, PolicyRow, SubjectKey,
    TableFilter,
};
use tessera_directory::{
    DirectoryCache, GroupPermissionResolver, PermissionAggregator, UserPermissionResolver,
};
use tessera_store::{MemoryPolicyStore, MemoryTokenStore, TokenRequest, TokenStore};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn group_resolver(
    policy: &Arc<MemoryPolicyStore>,
    tokens: &Arc<MemoryTokenStore>,
    config: DirectoryConfig,
) -> GroupPermissionResolver {
    init_tracing();
    GroupPermissionResolver::new(
        Arc::clone(policy) as Arc<dyn tessera_store::PolicyStore>,
        Arc::clone(tokens) as Arc<dyn TokenStore>,
        Arc::new(DirectoryCache::new()),
        config,
    )
}

fn user_resolver(
    policy: &Arc<MemoryPolicyStore>,
    tokens: &Arc<MemoryTokenStore>,
    config: DirectoryConfig,
) -> UserPermissionResolver {
    init_tracing();
    UserPermissionResolver::new(
        Arc::clone(policy) as Arc<dyn tessera_store::PolicyStore>,
        Arc::clone(tokens) as Arc<dyn TokenStore>,
        config,
    )
}

fn mode_of<'a>(tokens: &'a [CapabilityToken], table: &str) -> Option<&'a CapabilityToken> {
    tokens.iter().find(|t| t.table == table)
}

#[tokio::test]
async fn non_admin_gets_one_token_per_role_wide_row() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("books", "subscriber", PermissionLevel::ReadWrite),
        PolicyRow::new("reports", "subscriber", PermissionLevel::Read),
        PolicyRow::new("archive", "subscriber", PermissionLevel::None),
        PolicyRow::new("notes", "subscriber", PermissionLevel::IdReadWrite),
        PolicyRow::new("grades", "subscriber", PermissionLevel::IdRead),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());
    let resolver = group_resolver(&policy, &tokens, DirectoryConfig::default());

    let granted = resolver.resolve("subscriber", &TableFilter::all()).await;

    assert_eq!(granted.len(), 2);
    let books = mode_of(&granted, "books").unwrap();
    assert_eq!(books.mode, AccessMode::ReadWrite);
    assert_eq!(books.partition_scope, "books");
    let reports = mode_of(&granted, "reports").unwrap();
    assert_eq!(reports.mode, AccessMode::ReadOnly);
    // None and identity-scoped rows yield no role-wide token
    assert!(mode_of(&granted, "archive").is_none());
    assert!(mode_of(&granted, "notes").is_none());
    assert!(mode_of(&granted, "grades").is_none());
    assert!(tokens.has_principal(&SubjectKey::role("subscriber")));
}

#[tokio::test]
async fn cold_cache_resolution_is_idempotent() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("books", "subscriber", PermissionLevel::ReadWrite),
        PolicyRow::new("reports", "subscriber", PermissionLevel::Read),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());

    // Two resolvers with independent caches, same backing store
    let first = group_resolver(&policy, &tokens, DirectoryConfig::default());
    let second = group_resolver(&policy, &tokens, DirectoryConfig::default());

    let mut a = first.resolve("subscriber", &TableFilter::all()).await;
    let mut b = second.resolve("subscriber", &TableFilter::all()).await;
    a.sort_by(|x, y| x.table.cmp(&y.table));
    b.sort_by(|x, y| x.table.cmp(&y.table));

    assert_eq!(a, b);
    assert_eq!(tokens.stored_tokens().len(), 2);
}

#[tokio::test]
async fn diverged_mode_is_reconciled_by_replacement() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([PolicyRow::new(
        "books",
        "subscriber",
        PermissionLevel::ReadWrite,
    )]));
    let tokens = Arc::new(MemoryTokenStore::new());
    let subject = SubjectKey::role("subscriber");

    let stale = tokens
        .create_token(TokenRequest::role_wide(
            subject.clone(),
            "books",
            AccessMode::ReadOnly,
        ))
        .await
        .unwrap();

    let resolver = group_resolver(&policy, &tokens, DirectoryConfig::default());
    let granted = resolver.resolve("subscriber", &TableFilter::all()).await;

    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].mode, AccessMode::ReadWrite);
    assert_eq!(granted[0].resource_id, stale.resource_id);
    assert_ne!(granted[0].etag, stale.etag);
}

#[tokio::test]
async fn admin_skips_tables_with_identity_scoped_rows() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("books", "subscriber", PermissionLevel::ReadWrite),
        PolicyRow::new("notes", "teacher", PermissionLevel::IdReadWrite),
    ]));
    policy.add_table("audit");
    let tokens = Arc::new(MemoryTokenStore::new());
    let resolver = group_resolver(&policy, &tokens, DirectoryConfig::default());

    let granted = resolver.resolve("Admin", &TableFilter::all()).await;

    let mut tables: Vec<&str> = granted.iter().map(|t| t.table.as_str()).collect();
    tables.sort_unstable();
    assert_eq!(tables, vec!["audit", "books"]);
    assert!(granted.iter().all(|t| t.mode == AccessMode::ReadWrite));
}

#[tokio::test]
async fn admin_path_never_reconciles_an_existing_token() {
    let policy = Arc::new(MemoryPolicyStore::new());
    policy.add_table("books");
    let tokens = Arc::new(MemoryTokenStore::new());
    let subject = SubjectKey::role("admin");

    let stale = tokens
        .create_token(TokenRequest::role_wide(
            subject,
            "books",
            AccessMode::ReadOnly,
        ))
        .await
        .unwrap();

    let resolver = group_resolver(&policy, &tokens, DirectoryConfig::default());
    let granted = resolver.resolve("admin", &TableFilter::all()).await;

    // The ReadOnly token is returned as-is, mode untouched
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0], stale);
    assert_eq!(tokens.write_count(), 1);
}

#[tokio::test]
async fn identity_resolution_applies_only_the_matching_role() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("notes", "teacher", PermissionLevel::IdReadWrite),
        PolicyRow::new("notes", "parent", PermissionLevel::IdReadWrite),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());
    let resolver = user_resolver(&policy, &tokens, DirectoryConfig::default());

    let granted = resolver.resolve("u1", "parent", &TableFilter::all()).await;

    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].table, "notes");
    assert_eq!(granted[0].mode, AccessMode::ReadWrite);
    assert_eq!(granted[0].partition_scope, "u1");
    assert_eq!(granted[0].subject, SubjectKey::user("u1"));
}

#[tokio::test]
async fn admin_user_gets_every_identity_scoped_table() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("notes", "teacher", PermissionLevel::IdReadWrite),
        PolicyRow::new("grades", "parent", PermissionLevel::IdRead),
        PolicyRow::new("books", "subscriber", PermissionLevel::ReadWrite),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());
    let resolver = user_resolver(&policy, &tokens, DirectoryConfig::default());

    // Pre-existing ReadOnly token stays as-is on the admin branch
    let stale = tokens
        .create_token(TokenRequest::identity_scoped(
            SubjectKey::user("a1"),
            "grades",
            AccessMode::ReadOnly,
            "a1",
        ))
        .await
        .unwrap();

    let granted = resolver.resolve("a1", "admin", &TableFilter::all()).await;

    assert_eq!(granted.len(), 2);
    assert_eq!(*mode_of(&granted, "grades").unwrap(), stale);
    let notes = mode_of(&granted, "notes").unwrap();
    assert_eq!(notes.mode, AccessMode::ReadWrite);
    assert_eq!(notes.partition_scope, "a1");
    // Role-wide rows never reach the identity path
    assert!(mode_of(&granted, "books").is_none());
}

#[tokio::test]
async fn group_matching_is_case_insensitive() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("books", "Subscriber", PermissionLevel::Read),
        PolicyRow::new("notes", "Teacher", PermissionLevel::IdRead),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());

    let groups = group_resolver(&policy, &tokens, DirectoryConfig::default());
    let granted = groups.resolve("sUBSCRIBER", &TableFilter::all()).await;
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].subject, SubjectKey::role("subscriber"));

    let users = user_resolver(&policy, &tokens, DirectoryConfig::default());
    let granted = users.resolve("u1", "TEACHER", &TableFilter::all()).await;
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].table, "notes");
}

#[tokio::test]
async fn duplicate_branches_collapse_by_token_identity() {
    // Duplicate (table, role) rows are unguarded; with the token already
    // stored, both branches surface the same physical token
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("notes", "parent", PermissionLevel::IdReadWrite),
        PolicyRow::new("notes", "parent", PermissionLevel::IdReadWrite),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());
    tokens
        .create_token(TokenRequest::identity_scoped(
            SubjectKey::user("u1"),
            "notes",
            AccessMode::ReadWrite,
            "u1",
        ))
        .await
        .unwrap();

    let resolver = user_resolver(&policy, &tokens, DirectoryConfig::default());
    let granted = resolver.resolve("u1", "parent", &TableFilter::all()).await;

    assert_eq!(granted.len(), 1);
}

#[tokio::test]
async fn cached_group_result_skips_the_backing_store_until_expiry() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("books", "subscriber", PermissionLevel::ReadWrite),
        PolicyRow::new("reports", "subscriber", PermissionLevel::Read),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());
    let config = DirectoryConfig {
        cache_ttl: Duration::from_millis(80),
        ..DirectoryConfig::default()
    };
    let resolver = group_resolver(&policy, &tokens, config);

    let first = resolver.resolve("subscriber", &TableFilter::all()).await;
    let queries_after_first = policy.query_count();
    let reads_after_first = tokens.read_count();

    // Within the window: served from cache, no store traffic
    let second = resolver.resolve("subscriber", &TableFilter::all()).await;
    assert_eq!(first, second);
    assert_eq!(policy.query_count(), queries_after_first);
    assert_eq!(tokens.read_count(), reads_after_first);

    // Past the window: recomputed against the store
    tokio::time::sleep(Duration::from_millis(120)).await;
    let third = resolver.resolve("subscriber", &TableFilter::all()).await;
    assert_eq!(third.len(), 2);
    assert!(policy.query_count() > queries_after_first);
    assert!(tokens.read_count() > reads_after_first);
}

#[tokio::test]
async fn one_failing_table_does_not_sink_the_rest() {
    let rows: Vec<PolicyRow> = ["t1", "t2", "t3", "t4", "t5"]
        .iter()
        .map(|t| PolicyRow::new(*t, "subscriber", PermissionLevel::ReadWrite))
        .collect();
    let policy = Arc::new(MemoryPolicyStore::with_rows(rows));
    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.fail_table("t3");

    let resolver = group_resolver(&policy, &tokens, DirectoryConfig::default());
    let granted = resolver.resolve("subscriber", &TableFilter::all()).await;

    assert_eq!(granted.len(), 4);
    assert!(granted.iter().all(|t| t.table != "t3"));
}

#[tokio::test]
async fn table_filter_restricts_both_paths() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("books", "subscriber", PermissionLevel::ReadWrite),
        PolicyRow::new("reports", "subscriber", PermissionLevel::Read),
        PolicyRow::new("notes", "subscriber", PermissionLevel::IdReadWrite),
        PolicyRow::new("grades", "subscriber", PermissionLevel::IdRead),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());
    let filter = TableFilter::only(["books", "grades"]);

    let groups = group_resolver(&policy, &tokens, DirectoryConfig::default());
    let granted = groups.resolve("subscriber", &filter).await;
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].table, "books");

    let users = user_resolver(&policy, &tokens, DirectoryConfig::default());
    let granted = users.resolve("u1", "subscriber", &filter).await;
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].table, "grades");
    assert_eq!(granted[0].mode, AccessMode::ReadOnly);
}

#[tokio::test]
async fn aggregator_merges_the_worked_example() {
    // policy = [{books,subscriber,ReadWrite}, {reports,subscriber,Read},
    //           {notes,subscriber,IdReadWrite}]
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("books", "subscriber", PermissionLevel::ReadWrite),
        PolicyRow::new("reports", "subscriber", PermissionLevel::Read),
        PolicyRow::new("notes", "subscriber", PermissionLevel::IdReadWrite),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());
    let aggregator = PermissionAggregator::new(
        Arc::clone(&policy) as Arc<dyn tessera_store::PolicyStore>,
        Arc::clone(&tokens) as Arc<dyn TokenStore>,
        DirectoryConfig::default(),
    );

    let granted = aggregator
        .resolve_all("u1", "subscriber", &TableFilter::all())
        .await;

    assert_eq!(granted.len(), 3);
    let books = mode_of(&granted, "books").unwrap();
    assert_eq!(books.mode, AccessMode::ReadWrite);
    assert_eq!(books.subject, SubjectKey::role("subscriber"));
    let reports = mode_of(&granted, "reports").unwrap();
    assert_eq!(reports.mode, AccessMode::ReadOnly);
    let notes = mode_of(&granted, "notes").unwrap();
    assert_eq!(notes.mode, AccessMode::ReadWrite);
    assert_eq!(notes.partition_scope, "u1");
    assert_eq!(notes.subject, SubjectKey::user("u1"));
}

#[tokio::test]
async fn aggregator_serves_the_role_catalog_from_cache() {
    let policy = Arc::new(MemoryPolicyStore::with_rows([
        PolicyRow::new("books", "Subscriber", PermissionLevel::ReadWrite),
        PolicyRow::new("notes", "teacher", PermissionLevel::IdReadWrite),
        PolicyRow::new("grades", "teacher", PermissionLevel::IdRead),
    ]));
    let tokens = Arc::new(MemoryTokenStore::new());
    let aggregator = PermissionAggregator::new(
        Arc::clone(&policy) as Arc<dyn tessera_store::PolicyStore>,
        Arc::clone(&tokens) as Arc<dyn TokenStore>,
        DirectoryConfig::default(),
    );

    let roles = aggregator.list_roles().await;
    assert_eq!(roles, vec!["subscriber", "teacher"]);

    let queries = policy.query_count();
    let again = aggregator.list_roles().await;
    assert_eq!(again, roles);
    assert_eq!(policy.query_count(), queries);
}
