//! Session and authentication route handlers.
//!
//! Sign-in, sign-up and sign-out go through [`AuthService`]; the session
//! worker picks up the resulting identity event. Handlers wait briefly for
//! the session to reflect the outcome so the response carries the new state.
//!
//! [`AuthService`]: crate::services::AuthService

use std::time::Duration;

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::backend::FederatedCredential;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::services::auth::{LoginForm, SignInOutcome, SignUpForm};
use crate::session::SessionState;
use crate::state::AppState;

/// Upper bound on waiting for the session worker to apply a sign-in or
/// sign-out.
const SESSION_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Response to sign-in, sign-up and sign-out.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Whether the attempt succeeded. `false` without form errors means the
    /// provider failed; the details are in the server log.
    pub signed_in: bool,
    pub session: SessionState,
}

/// Wait until the session reports `authenticated`, or give up and return the
/// current state.
async fn settle(state: &AppState, authenticated: bool) -> SessionState {
    let session = state.session();
    match tokio::time::timeout(
        SESSION_SETTLE_TIMEOUT,
        session.wait_for(|s| !s.is_initializing && s.is_authenticated == authenticated),
    )
    .await
    {
        Ok(settled) => settled,
        Err(_) => {
            warn!(authenticated, "session did not settle in time");
            session.state()
        }
    }
}

async fn respond(state: &AppState, outcome: SignInOutcome) -> AuthResponse {
    match outcome {
        SignInOutcome::SignedIn(user) => {
            add_breadcrumb("auth", "Signed in", Some(&[("uid", user.uid.as_str())]));
            AuthResponse {
                signed_in: true,
                session: settle(state, true).await,
            }
        }
        SignInOutcome::Failed => AuthResponse {
            signed_in: false,
            session: state.session().state(),
        },
    }
}

/// Current session state.
pub async fn session(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.session().state())
}

/// Sign in with email and password.
#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> Result<Json<AuthResponse>> {
    let outcome = state
        .auth()
        .login(&form)
        .await
        .map_err(AppError::Unprocessable)?;
    Ok(Json(respond(&state, outcome).await))
}

/// Sign in with a Google id token.
#[instrument(skip(state, credential))]
pub async fn login_with_google(
    State(state): State<AppState>,
    Json(credential): Json<FederatedCredential>,
) -> Json<AuthResponse> {
    let outcome = state.auth().sign_in_with_google(&credential).await;
    Json(respond(&state, outcome).await)
}

/// Create a password account.
#[instrument(skip(state, form))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(form): Json<SignUpForm>,
) -> Result<Json<AuthResponse>> {
    let outcome = state
        .auth()
        .sign_up(&form)
        .await
        .map_err(AppError::Unprocessable)?;
    Ok(Json(respond(&state, outcome).await))
}

/// Sign out.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Json<AuthResponse> {
    state.auth().sign_out().await;
    add_breadcrumb("auth", "Signed out", None);
    Json(AuthResponse {
        signed_in: false,
        session: settle(&state, false).await,
    })
}
