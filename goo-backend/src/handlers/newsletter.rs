//! Double opt-in flow: signup, confirmation page and confirmation.

use std::sync::Arc;

use axum::extract::{Extension, Form, Query};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use goo_email::Email;
use goo_job_queue::Message;
use goo_jobs::job_types;
use serde::Deserialize;
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;
use crate::views::render_page;

const SIGNUP_FAILED: &str = "error signing up, refresh to try again";
const CONFIRM_FAILED: &str = "error confirming, refresh to try again";

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    #[serde(default)]
    pub token: String,
}

/// `302 Found` pointing at `location`.
fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// `POST /newsletter/signup`
pub async fn signup(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    let email = Email::parse(form.email.trim()).ok_or_else(|| ApiError::bad_request("email is invalid"))?;

    let token = state.db.signup_for_newsletter(&email).await.map_err(|error| {
        error!(%error, "Error signing up for newsletter");
        ApiError::bad_gateway(SIGNUP_FAILED)
    })?;

    let message = Message::for_job(job_types::CONFIRMATION_EMAIL)
        .with("email", email.as_str())
        .with("token", token);
    state.queue.send(&message).await.map_err(|error| {
        error!(%error, "Error sending newsletter message to queue");
        ApiError::bad_gateway(SIGNUP_FAILED)
    })?;

    info!(email = %email, "Newsletter signup");
    Ok(found("/newsletter/thanks"))
}

/// `GET /newsletter/confirm?token=`
pub async fn confirm_page(Query(params): Query<TokenParams>) -> Result<Html<String>, ApiError> {
    if params.token.is_empty() {
        return Err(ApiError::bad_request("token is missing"));
    }
    let token = html_escape::encode_double_quoted_attribute(&params.token);
    render_page("Confirm your subscription", "confirm.html", &[("token", token.as_ref())])
}

/// `POST /newsletter/confirm`
pub async fn confirm(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<TokenParams>,
) -> Result<Response, ApiError> {
    if form.token.is_empty() {
        return Err(ApiError::bad_request("token is missing"));
    }

    let email = state
        .db
        .confirm_newsletter_signup(&form.token)
        .await
        .map_err(|error| {
            error!(%error, "Error confirming newsletter signup");
            ApiError::bad_gateway(CONFIRM_FAILED)
        })?
        .ok_or_else(|| ApiError::bad_request("token is invalid"))?;

    let message = Message::for_job(job_types::WELCOME_EMAIL).with("email", email.as_str());
    state.queue.send(&message).await.map_err(|error| {
        error!(%error, "Error sending newsletter message to queue");
        ApiError::bad_gateway(CONFIRM_FAILED)
    })?;

    info!(email = %email, "Newsletter signup confirmed");
    Ok(found("/newsletter/confirmed"))
}
