//! Identity service boundary.
//!
//! The identity provider owns accounts and sessions. The storefront only
//! signs in, signs out, creates password accounts, and listens for
//! auth-state changes.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use club_clothing_core::{AuthProvider, Email, UserId};

/// Capacity of the auth-state broadcast channel.
const AUTH_STATE_CHANNEL_CAPACITY: usize = 32;

/// The identity provider's view of a signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    /// Provider-issued unique id.
    pub uid: UserId,
    /// Account email, when the provider knows it.
    pub email: Option<Email>,
    /// Display name (federated accounts usually carry one).
    pub display_name: Option<String>,
}

/// One auth-state callback: `Some` when signed in, `None` when signed out.
pub type AuthStateEvent = Option<IdentityUser>;

/// A subscription to auth-state changes.
///
/// `current` is the state at subscription time and plays the role of the
/// initial callback every identity provider fires on subscribe.
#[derive(Debug)]
pub struct AuthStateSubscription {
    /// State at the moment of subscribing.
    pub current: AuthStateEvent,
    /// Every later change, in order.
    pub events: broadcast::Receiver<AuthStateEvent>,
}

/// Credential obtained from a federated provider's own sign-in flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum FederatedCredential {
    /// Google OpenID Connect id token.
    Google {
        /// The id token returned by Google's sign-in flow.
        id_token: String,
    },
}

impl FederatedCredential {
    /// Profile provider recorded for accounts created with this credential.
    #[must_use]
    pub const fn provider(&self) -> AuthProvider {
        match self {
            Self::Google { .. } => AuthProvider::Google,
        }
    }

    /// The raw token sent to the identity provider.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Google { id_token } => id_token,
        }
    }
}

/// Errors reported by the identity service.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Wrong email/password combination (or unknown email).
    #[error("invalid login credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("email already in use")]
    EmailAlreadyInUse,

    /// The provider rejected the password as too weak.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// The account has been disabled by an administrator.
    #[error("user disabled")]
    UserDisabled,

    /// Any other provider-side rejection.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Local password hashing failed.
    #[error("password hashing error")]
    PasswordHash,
}

/// Remote identity service.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Subscribe to auth-state changes.
    fn subscribe(&self) -> AuthStateSubscription;

    /// The currently signed-in account, if any.
    fn current_user(&self) -> AuthStateEvent;

    /// Sign in with email and password.
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<IdentityUser, IdentityError>;

    /// Sign in with a federated provider credential.
    async fn sign_in_with_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<IdentityUser, IdentityError>;

    /// Create a password account and sign it in.
    async fn create_user_with_password(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<IdentityUser, IdentityError>;

    /// Sign out the current account. Signing out while signed out is a no-op.
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Auth-state bookkeeping shared by identity implementations.
///
/// Updating the current user and broadcasting the change happen under one
/// lock, so a subscriber never misses or double-observes a change.
pub struct AuthStateEmitter {
    current: Mutex<AuthStateEvent>,
    sender: broadcast::Sender<AuthStateEvent>,
}

impl AuthStateEmitter {
    /// Create an emitter in the signed-out state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(AUTH_STATE_CHANNEL_CAPACITY);
        Self {
            current: Mutex::new(None),
            sender,
        }
    }

    /// Subscribe, capturing the current state atomically with the receiver.
    pub fn subscribe(&self) -> AuthStateSubscription {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        AuthStateSubscription {
            current: current.clone(),
            events: self.sender.subscribe(),
        }
    }

    /// The current state.
    pub fn current(&self) -> AuthStateEvent {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record and broadcast a new state.
    pub fn emit(&self, event: AuthStateEvent) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.clone_from(&event);
        // No receivers is fine: nobody is listening yet.
        let _ = self.sender.send(event);
    }
}

impl Default for AuthStateEmitter {
    fn default() -> Self {
        Self::new()
    }
}
