//! Authentication gate for protected views.

use std::time::Duration;

use serde::Serialize;

use crate::session::SessionState;

/// Where a denied visitor is sent.
pub const LOGIN_PATH: &str = "/login";

/// How long a denied view shows its notice before redirecting.
pub const LOGIN_REDIRECT_DELAY: Duration = Duration::from_secs(3);

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardState {
    /// The session has not reported yet.
    Checking,
    Allowed,
    /// Not signed in; the view redirects to [`LOGIN_PATH`].
    Denied,
}

/// What a denied view should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub location: &'static str,
    pub delay_ms: u64,
}

impl Redirect {
    /// Redirect to the login page after [`LOGIN_REDIRECT_DELAY`].
    #[must_use]
    pub fn to_login() -> Self {
        Self {
            location: LOGIN_PATH,
            delay_ms: u64::try_from(LOGIN_REDIRECT_DELAY.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Gate for one mounted protected view.
///
/// Starts in `Checking` and resolves once the session stops initializing.
/// After that it follows sign-ins and sign-outs but never goes back to
/// `Checking`; only a fresh mount starts over.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    state: GuardState,
}

impl AuthGuard {
    /// A freshly mounted guard.
    #[must_use]
    pub const fn mount() -> Self {
        Self {
            state: GuardState::Checking,
        }
    }

    /// A guard mounted against an existing session state.
    #[must_use]
    pub fn mount_with(session: &SessionState) -> Self {
        let mut guard = Self::mount();
        guard.observe(session);
        guard
    }

    #[must_use]
    pub const fn state(&self) -> GuardState {
        self.state
    }

    /// Update from a session snapshot and return the new state.
    pub const fn observe(&mut self, session: &SessionState) -> GuardState {
        self.state = match (self.state, session.is_initializing) {
            (GuardState::Checking, true) => GuardState::Checking,
            _ if session.is_authenticated => GuardState::Allowed,
            _ => GuardState::Denied,
        };
        self.state
    }

    /// The redirect to perform, when denied.
    #[must_use]
    pub fn redirect(&self) -> Option<Redirect> {
        matches!(self.state, GuardState::Denied).then(Redirect::to_login)
    }
}

impl Default for AuthGuard {
    fn default() -> Self {
        Self::mount()
    }
}
