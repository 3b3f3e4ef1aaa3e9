//! Create-vs-update reconciliation of a single token slot
//!
//! Both resolvers funnel per-table branches through these two helpers. The
//! admin paths use `get_or_create`, which returns a found token as-is and
//! never rewrites its mode; the non-admin paths use `reconcile`, which
//! replaces a stored token whenever its mode diverges from the desired one.

use tessera_core::{CapabilityToken, DirectoryResult};
use tessera_store::{TokenRequest, TokenStore};

/// Fetch the stored token for the request's slot, creating it if absent
///
/// An existing token is returned unchanged even when its mode differs from
/// the requested one.
pub(crate) async fn get_or_create(
    store: &dyn TokenStore,
    request: TokenRequest,
) -> DirectoryResult<CapabilityToken> {
    match store.find_token(&request.subject, &request.table).await? {
        Some(existing) => Ok(existing),
        None => store.create_token(request).await,
    }
}

/// Converge the stored token for the request's slot onto the desired mode
pub(crate) async fn reconcile(
    store: &dyn TokenStore,
    request: TokenRequest,
) -> DirectoryResult<CapabilityToken> {
    match store.find_token(&request.subject, &request.table).await? {
        None => store.create_token(request).await,
        Some(existing) if existing.mode != request.mode => {
            tracing::debug!(
                subject = %existing.subject,
                table = %existing.table,
                stored_mode = ?existing.mode,
                desired_mode = ?request.mode,
                "Stored token mode diverged, replacing"
            );
            store.replace_token(&existing, request).await
        }
        Some(existing) => Ok(existing),
    }
}
