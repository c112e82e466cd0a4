use std::sync::Arc;

use axum::extract::{Extension, Form};
use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::{error, info};

use crate::auth::{require_basic_auth, ADMIN_USER};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MigrateToForm {
    #[serde(default)]
    pub version: String,
}

/// `POST /migrate/up`
pub async fn migrate_up(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(), ApiError> {
    require_basic_auth(&headers, ADMIN_USER, state.admin_password())?;

    state.db.migrate_up().await.map_err(|e| {
        error!(error = %e, "Error migrating up");
        ApiError::bad_gateway(e.to_string())
    })?;
    info!("Migrated up");
    Ok(())
}

/// `POST /migrate/to` with form field `version`.
pub async fn migrate_to(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<MigrateToForm>,
) -> Result<(), ApiError> {
    require_basic_auth(&headers, ADMIN_USER, state.admin_password())?;

    let version = parse_version(&form.version)?;
    state.db.migrate_to(version).await.map_err(|e| {
        error!(error = %e, version, "Error migrating");
        ApiError::bad_gateway(e.to_string())
    })?;
    info!(version, "Migrated to version");
    Ok(())
}

fn parse_version(raw: &str) -> Result<i64, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::bad_request("version is empty"));
    }
    raw.parse::<u32>()
        .map(i64::from)
        .map_err(|_| ApiError::bad_request("version is not number"))
}
