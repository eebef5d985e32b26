//! Controller for third-party login flows.
//!
//! Both endpoints are reached through browser redirects, so parameters arrive in the
//! query string, or as a form body for providers that post the callback.

use crate::controller::ApiResponse;
use crate::error::WebErrorKind;
use crate::{AppState, Error};

use axum::extract::{Form, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use domain::{CancellationToken, LoginOutcome, Resolution};
use log::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Query parameters for starting a login
#[derive(Debug, Default, Deserialize)]
pub struct LoginStart {
    pub application: Option<String>,
}

/// Query parameters the provider sends back to the callback
#[derive(Debug, Default, Deserialize)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Body returned once a login completes.
#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub provider_id: String,
    pub subject_id: String,
    pub email: Option<String>,
    pub tag: Option<String>,
    pub user_id: Option<String>,
    pub found: bool,
}

impl From<LoginOutcome> for LoginResult {
    fn from(outcome: LoginOutcome) -> Self {
        let found = outcome.resolution.found();
        let user_id = match outcome.resolution {
            Resolution::Found(user_id) => Some(user_id),
            Resolution::NotFound { .. } => None,
        };
        Self {
            provider_id: outcome.identity.provider_id,
            subject_id: outcome.identity.subject_id,
            email: outcome.identity.email,
            tag: outcome.tag,
            user_id,
            found,
        }
    }
}

/// GET|POST /oauth/{provider}
///
/// Starts a login and redirects the browser to the provider's consent page.
pub async fn authorize(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<LoginStart>,
) -> Result<impl IntoResponse, Error> {
    debug!("Starting {} login", provider);
    let url = app_state.gateway.begin(&provider, params.application).await?;
    Ok(Redirect::to(&url))
}

/// GET /oauth/{provider}/callback
///
/// Completes the login the provider redirected back for.
pub async fn callback(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<OAuthCallback>,
) -> Result<impl IntoResponse, Error> {
    complete_login(app_state, provider, params).await
}

/// POST /oauth/{provider}/callback
///
/// Same as [`callback`] for providers answering with `response_mode=form_post`.
pub async fn callback_form(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    Form(params): Form<OAuthCallback>,
) -> Result<impl IntoResponse, Error> {
    complete_login(app_state, provider, params).await
}

async fn complete_login(
    app_state: AppState,
    provider: String,
    params: OAuthCallback,
) -> Result<Json<ApiResponse<LoginResult>>, Error> {
    if let Some(error) = params.error {
        warn!("{} login was not granted: {}", provider, error);
        return Err(Error::Web(WebErrorKind::ProviderDenied));
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(Error::Web(WebErrorKind::Input))?;
    // An absent state fails the same way a forged one does.
    let state = params.state.unwrap_or_default();

    // The provider calls are bounded by the request deadline. Cancelling lets the login
    // fail as `Aborted` instead of the connection being dropped mid-exchange.
    let cancel = CancellationToken::new();
    let deadline = Duration::from_secs(app_state.config.request_timeout_secs);
    let timer = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(deadline).await;
            cancel.cancel();
        }
    });

    let outcome = app_state
        .gateway
        .complete_until(&provider, &code, &state, &cancel)
        .await;
    timer.abort();

    Ok(Json(ApiResponse::new(
        StatusCode::OK.into(),
        LoginResult::from(outcome?),
    )))
}
