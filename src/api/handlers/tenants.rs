//! Protected tenant directory endpoints.
//!
//! Both routes sit behind bearer authentication and the `tenants.read`
//! permission; the layering happens in the router, not here.

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::store::Stores;
use crate::tenant::{self, TenantRecord};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TenantSummary {
    pub tenant_id: String,
    pub display_name: String,
    pub identifying_email: String,
    pub is_active: bool,
}

impl From<TenantRecord> for TenantSummary {
    fn from(record: TenantRecord) -> Self {
        Self {
            tenant_id: record.tenant_id.to_string(),
            display_name: record.display_name,
            identifying_email: record.identifying_email,
            is_active: record.is_active,
        }
    }
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct LookupParams {
    /// Identifying email, matched case-insensitively.
    email: String,
}

#[utoipa::path(
    get,
    path = "/tenants",
    responses(
        (status = 200, description = "Every registered tenant", body = [TenantSummary]),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller lacks the tenants.read permission"),
        (status = 500, description = "Store failure")
    ),
    tag = "tenants"
)]
// axum handler listing every tenant
pub async fn list_tenants(stores: Extension<Stores>) -> impl IntoResponse {
    match stores.0.tenants().get_all().await {
        Ok(records) => {
            let tenants: Vec<TenantSummary> =
                records.into_iter().map(TenantSummary::from).collect();
            Json(tenants).into_response()
        }
        Err(err) => {
            error!("Failed to list tenants: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/tenants/lookup",
    params(LookupParams),
    responses(
        (status = 200, description = "Tenant matching the identifying email", body = TenantSummary),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Caller lacks the tenants.read permission"),
        (status = 404, description = "No tenant matches"),
        (status = 500, description = "Store failure")
    ),
    tag = "tenants"
)]
// axum handler resolving one tenant by identifying email
pub async fn lookup_tenant(
    stores: Extension<Stores>,
    Query(params): Query<LookupParams>,
) -> impl IntoResponse {
    match tenant::find_by_identifying_email(stores.0.tenants().as_ref(), &params.email).await {
        Ok(Some(record)) => Json(TenantSummary::from(record)).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Tenant not found".to_string()).into_response(),
        Err(err) => {
            error!("Failed to resolve tenant: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
