//! Authentication extractor for protected routes.
//!
//! Runs the [`AuthGuard`] against the live session: waits for the session to
//! finish initializing, then admits signed-in visitors and turns everyone
//! else away with the login redirect.

use std::time::Duration;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::debug;

use crate::guard::{AuthGuard, GuardState, Redirect};
use crate::session::SessionState;
use crate::state::AppState;

/// How long a request waits for the identity provider's first report.
const INITIALIZATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Extractor that requires a signed-in session.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(session): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {:?}!", session.user)
/// }
/// ```
pub struct RequireAuth(pub SessionState);

/// Why a protected route was refused.
#[derive(Debug)]
pub enum AuthRejection {
    /// The session did not finish initializing in time.
    StillChecking,
    /// Not signed in.
    Denied(Redirect),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::StillChecking => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "guard": GuardState::Checking })),
            )
                .into_response(),
            Self::Denied(redirect) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "guard": GuardState::Denied,
                    "error": "You must be signed in to continue",
                    "redirect": redirect,
                })),
            )
                .into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = tokio::time::timeout(
            INITIALIZATION_TIMEOUT,
            state.session().wait_until_initialized(),
        )
        .await
        .map_err(|_| AuthRejection::StillChecking)?;

        let guard = AuthGuard::mount_with(&session);
        match guard.state() {
            GuardState::Allowed => Ok(Self(session)),
            GuardState::Checking => Err(AuthRejection::StillChecking),
            GuardState::Denied => {
                debug!("protected route denied");
                Err(AuthRejection::Denied(Redirect::to_login()))
            }
        }
    }
}
