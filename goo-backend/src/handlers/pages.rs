use axum::http::StatusCode;
use axum::response::Html;

use crate::error::ApiError;
use crate::views::render_page;

pub async fn front_page() -> Result<Html<String>, ApiError> {
    render_page("Goo", "index.html", &[])
}

pub async fn thanks() -> Result<Html<String>, ApiError> {
    render_page("Thanks for signing up!", "thanks.html", &[])
}

pub async fn confirmed() -> Result<Html<String>, ApiError> {
    render_page("You are subscribed!", "confirmed.html", &[])
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 page not found")
}
