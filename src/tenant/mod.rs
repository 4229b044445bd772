//! Tenant records and resolution by identifying email.

use crate::store::{StoreError, TenantDirectory};
use tracing::debug;
use uuid::Uuid;

/// A tenant as seen by the authorization core: looked up, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRecord {
    pub tenant_id: Uuid,
    pub display_name: String,
    pub identifying_email: String,
    pub is_active: bool,
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Find the tenant whose identifying email matches `email`, ignoring case.
///
/// Blank input short-circuits to `None` without querying the store, so an
/// empty form field can never match anything. Zero matches is a normal
/// `None`, not an error.
///
/// The directory exposes no filtered query surface, the match happens here.
///
/// # Errors
///
/// Returns an error only when the underlying store fails.
pub async fn find_by_identifying_email(
    store: &dyn TenantDirectory,
    email: &str,
) -> Result<Option<TenantRecord>, StoreError> {
    let normalized = normalize_email(email);
    if normalized.is_empty() {
        debug!("blank tenant identifier, skipping lookup");
        return Ok(None);
    }

    let tenants = store.get_all().await?;
    Ok(tenants
        .into_iter()
        .find(|tenant| normalize_email(&tenant.identifying_email) == normalized))
}
