use std::sync::Arc;
use std::time::Duration;

use axum::extract::Extension;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, migrate, newsletter, pages};
use crate::metrics::{metrics_handler, track_metrics};
use crate::state::AppState;

/// Upper bound for handling a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the axum router with the provided shared application state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(pages::front_page))
        .route("/health", get(health::health))
        .route("/newsletter/signup", post(newsletter::signup))
        .route("/newsletter/thanks", get(pages::thanks))
        .route(
            "/newsletter/confirm",
            get(newsletter::confirm_page).post(newsletter::confirm),
        )
        .route("/newsletter/confirmed", get(pages::confirmed))
        .route("/metrics", get(metrics_handler))
        .route("/migrate/up", post(migrate::migrate_up))
        .route("/migrate/to", post(migrate::migrate_to))
        .fallback(pages::not_found)
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(Extension(state))
}
