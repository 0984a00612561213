//! Tenant API endpoints. Reads are public; writes require an admin.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, require_field};
use crate::auth::{AdminOnly, ApiAuth};
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::TokenIssuer;

#[derive(Clone)]
pub struct TenantsState {
    pub db: Database,
    pub jwt: Arc<TokenIssuer>,
}

impl_has_auth_backend!(TenantsState);

pub fn router(state: TenantsState) -> Router {
    Router::new()
        .route("/", get(list_tenants).post(create_tenant))
        .route(
            "/{id}",
            get(get_tenant).patch(update_tenant).delete(delete_tenant),
        )
        .with_state(state)
}

#[derive(Deserialize)]
struct TenantRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

impl TenantRequest {
    fn validate(&self) -> Result<(&str, &str), ApiError> {
        let name = require_field(&self.name, "Tenant name is required.")?;
        let address = require_field(&self.address, "Tenant address is required.")?;
        Ok((name, address))
    }
}

#[derive(Serialize)]
struct IdResponse {
    id: i64,
}

async fn create_tenant(
    State(state): State<TenantsState>,
    ApiAuth(auth, _): ApiAuth<AdminOnly>,
    Json(payload): Json<TenantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, address) = payload.validate()?;

    let id = state
        .db
        .tenants()
        .create(name, address)
        .await
        .db_err("Failed to create tenant")?;

    info!(tenant_id = id, admin_id = auth.user_id, "Tenant created");

    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

async fn list_tenants(State(state): State<TenantsState>) -> Result<impl IntoResponse, ApiError> {
    let tenants = state
        .db
        .tenants()
        .list()
        .await
        .db_err("Failed to list tenants")?;
    Ok(Json(tenants))
}

async fn get_tenant(
    State(state): State<TenantsState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let tenant = state
        .db
        .tenants()
        .get_by_id(id)
        .await
        .db_err("Failed to get tenant")?
        .ok_or_else(|| ApiError::not_found("Tenant not found."))?;
    Ok(Json(tenant))
}

async fn update_tenant(
    State(state): State<TenantsState>,
    ApiAuth(auth, _): ApiAuth<AdminOnly>,
    Path(id): Path<i64>,
    Json(payload): Json<TenantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, address) = payload.validate()?;

    let updated = state
        .db
        .tenants()
        .update(id, name, address)
        .await
        .db_err("Failed to update tenant")?;
    if !updated {
        return Err(ApiError::not_found("Tenant not found."));
    }

    info!(tenant_id = id, admin_id = auth.user_id, "Tenant updated");

    Ok(Json(IdResponse { id }))
}

async fn delete_tenant(
    State(state): State<TenantsState>,
    ApiAuth(auth, _): ApiAuth<AdminOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .tenants()
        .delete(id)
        .await
        .db_err("Failed to delete tenant")?;
    if !deleted {
        return Err(ApiError::not_found("Tenant not found."));
    }

    info!(tenant_id = id, admin_id = auth.user_id, "Tenant deleted");

    Ok(Json(IdResponse { id }))
}
