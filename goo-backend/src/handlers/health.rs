use std::sync::Arc;

use axum::extract::Extension;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /health`: 200 when the database answers, 502 otherwise.
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> Result<&'static str, ApiError> {
    state.db.ping().await.map_err(|error| {
        tracing::warn!(%error, "Health check failed");
        ApiError::bad_gateway("database unavailable")
    })?;
    Ok("OK")
}
