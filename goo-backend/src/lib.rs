//! HTTP service for the Goo newsletter: signup and confirmation pages,
//! health, metrics and migration endpoints.

pub mod app;
pub mod auth;
pub mod config_helpers;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;
pub mod tracing_setup;
pub mod views;

pub use app::build_router;
pub use error::ApiError;
pub use state::AppState;
