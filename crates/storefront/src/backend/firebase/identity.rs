//! Identity Toolkit REST client (Firebase Authentication).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};
use url::Url;

use club_clothing_core::{Email, UserId};

use super::error_message;
use crate::backend::identity::{
    AuthStateEmitter, AuthStateEvent, AuthStateSubscription, FederatedCredential, IdentityError,
    IdentityService, IdentityUser,
};
use crate::config::FirebaseConfig;

/// `requestUri` sent with federated sign-ins. The id token is already
/// verified by Google, so no redirect ever happens.
const IDP_REQUEST_URI: &str = "http://localhost";

/// Refresh this long before the id token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when a response omits `expiresIn`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Client for the Identity Toolkit `accounts:*` endpoints.
///
/// Tracks the signed-in account locally and broadcasts auth-state changes,
/// the way the browser SDK's auth-state listener does.
#[derive(Clone)]
pub struct IdentityToolkitClient {
    inner: Arc<IdentityToolkitInner>,
}

struct IdentityToolkitInner {
    client: reqwest::Client,
    base_url: String,
    token_url: String,
    api_key: SecretString,
    auth_state: AuthStateEmitter,
    tokens: Mutex<Option<TokenSession>>,
}

/// Tokens of the signed-in account.
struct TokenSession {
    id_token: SecretString,
    refresh_token: Option<SecretString>,
    expires_at: Instant,
}

impl TokenSession {
    fn new(id_token: String, refresh_token: Option<String>, expires_in: Option<&str>) -> Self {
        let lifetime = expires_in
            .and_then(|secs| secs.parse().ok())
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
        Self {
            id_token: SecretString::from(id_token),
            refresh_token: refresh_token.map(SecretString::from),
            expires_at: Instant::now() + lifetime,
        }
    }

    fn is_expiring(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN >= self.expires_at
    }

    fn has_refresh_token(&self, token: &SecretString) -> bool {
        self.refresh_token
            .as_ref()
            .is_some_and(|current| current.expose_secret() == token.expose_secret())
    }
}

/// Subset of the sign-in/sign-up response we use.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Seconds, as a string.
    #[serde(default)]
    expires_in: Option<String>,
}

/// Secure Token exchange response. Unlike the Identity Toolkit, this API
/// answers in snake case.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

impl AccountResponse {
    fn into_user(self) -> IdentityUser {
        IdentityUser {
            uid: UserId::new(self.local_id),
            email: self
                .email
                .filter(|e| !e.is_empty())
                .map(Email::from_trusted),
            display_name: self.display_name.filter(|n| !n.is_empty()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

impl IdentityToolkitClient {
    /// Create a new Identity Toolkit client.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &FirebaseConfig) -> Self {
        Self {
            inner: Arc::new(IdentityToolkitInner {
                client,
                base_url: config.identity_url.as_str().trim_end_matches('/').to_owned(),
                token_url: config.token_url.as_str().trim_end_matches('/').to_owned(),
                api_key: config.api_key.clone(),
                auth_state: AuthStateEmitter::new(),
                tokens: Mutex::new(None),
            }),
        }
    }

    /// The signed-in account's id token, for authenticating other Firebase
    /// requests. A token about to expire is refreshed first.
    ///
    /// `None` when signed out, or when a needed refresh fails.
    pub async fn id_token(&self) -> Option<SecretString> {
        let refresh_token = {
            let tokens = self.tokens();
            let session = tokens.as_ref()?;
            if !session.is_expiring() {
                return Some(session.id_token.clone());
            }
            session.refresh_token.clone()?
        };
        self.refresh(refresh_token).await
    }

    /// Exchange the refresh token for a new id token now, regardless of
    /// expiry. Used when a request was rejected as unauthenticated.
    pub async fn refresh_id_token(&self) -> Option<SecretString> {
        let refresh_token = self.tokens().as_ref()?.refresh_token.clone()?;
        self.refresh(refresh_token).await
    }

    fn tokens(&self) -> MutexGuard<'_, Option<TokenSession>> {
        self.inner
            .tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh(&self, refresh_token: SecretString) -> Option<SecretString> {
        let response = match self.exchange_refresh_token(&refresh_token).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "id token refresh failed");
                return None;
            }
        };

        let mut tokens = self.tokens();
        // A sign-out or another sign-in while the exchange was in flight wins.
        if !tokens
            .as_ref()
            .is_some_and(|session| session.has_refresh_token(&refresh_token))
        {
            debug!("session changed during token refresh, discarding result");
            return None;
        }

        let session = TokenSession::new(
            response.id_token,
            Some(response.refresh_token),
            response.expires_in.as_deref(),
        );
        let id_token = session.id_token.clone();
        *tokens = Some(session);
        debug!("id token refreshed");
        Some(id_token)
    }

    /// POST `grant_type=refresh_token` to the Secure Token API.
    #[instrument(skip_all)]
    async fn exchange_refresh_token(
        &self,
        refresh_token: &SecretString,
    ) -> Result<RefreshResponse, IdentityError> {
        let mut url = Url::parse(&format!("{}/token", self.inner.token_url))
            .map_err(|e| IdentityError::Provider(format!("invalid token endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token.expose_secret())
            .finish();

        let response = self
            .inner
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = error_message(&text);
            debug!(%status, message = %message, "secure token api rejected refresh");
            return Err(classify_error(&message));
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn endpoint(&self, method: &str) -> Result<Url, IdentityError> {
        let mut url = Url::parse(&format!("{}/accounts:{method}", self.inner.base_url))
            .map_err(|e| IdentityError::Provider(format!("invalid identity endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        Ok(url)
    }

    /// POST to an `accounts:*` method and parse the account response.
    async fn call<B: Serialize + Sync>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<AccountResponse, IdentityError> {
        let response = self
            .inner
            .client
            .post(self.endpoint(method)?)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = error_message(&text);
            debug!(%status, method, message = %message, "identity toolkit rejected request");
            return Err(classify_error(&message));
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn signed_in(&self, mut response: AccountResponse) -> IdentityUser {
        *self.tokens() = response.id_token.take().map(|id_token| {
            TokenSession::new(
                id_token,
                response.refresh_token.take(),
                response.expires_in.as_deref(),
            )
        });
        let user = response.into_user();
        self.inner.auth_state.emit(Some(user.clone()));
        user
    }
}

#[async_trait]
impl IdentityService for IdentityToolkitClient {
    fn subscribe(&self) -> AuthStateSubscription {
        self.inner.auth_state.subscribe()
    }

    fn current_user(&self) -> AuthStateEvent {
        self.inner.auth_state.current()
    }

    #[instrument(skip_all, fields(email = %email))]
    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<IdentityUser, IdentityError> {
        let response = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(self.signed_in(response))
    }

    #[instrument(skip(self, credential), fields(provider = %credential.provider()))]
    async fn sign_in_with_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<IdentityUser, IdentityError> {
        let provider_id = credential
            .provider()
            .federated_provider_id()
            .ok_or_else(|| IdentityError::Provider("provider is not federated".to_owned()))?;

        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", credential.token())
            .append_pair("providerId", provider_id)
            .finish();

        let response = self
            .call(
                "signInWithIdp",
                &json!({
                    "postBody": post_body,
                    "requestUri": IDP_REQUEST_URI,
                    "returnIdpCredential": true,
                    "returnSecureToken": true,
                }),
            )
            .await?;
        Ok(self.signed_in(response))
    }

    #[instrument(skip_all, fields(email = %email))]
    async fn create_user_with_password(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<IdentityUser, IdentityError> {
        let mut response = self
            .call(
                "signUp",
                &PasswordRequest {
                    email: email.as_str(),
                    password: password.expose_secret(),
                    return_secure_token: true,
                },
            )
            .await?;

        if let (Some(name), Some(id_token)) = (display_name, response.id_token.as_deref()) {
            let update = self
                .call(
                    "update",
                    &json!({
                        "idToken": id_token,
                        "displayName": name,
                        "returnSecureToken": false,
                    }),
                )
                .await;
            match update {
                Ok(_) => response.display_name = Some(name.to_owned()),
                Err(e) => warn!(error = %e, "failed to set display name on new account"),
            }
        }

        Ok(self.signed_in(response))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        *self.tokens() = None;
        if self.inner.auth_state.current().is_some() {
            self.inner.auth_state.emit(None);
        }
        Ok(())
    }
}

/// Map an Identity Toolkit error message to an [`IdentityError`].
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be
/// at least 6 characters`.
fn classify_error(message: &str) -> IdentityError {
    let code = message.split_whitespace().next().unwrap_or_default();
    match code {
        "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" => {
            IdentityError::InvalidCredentials
        }
        "EMAIL_EXISTS" => IdentityError::EmailAlreadyInUse,
        "WEAK_PASSWORD" => IdentityError::WeakPassword(message.to_owned()),
        "USER_DISABLED" => IdentityError::UserDisabled,
        _ => IdentityError::Provider(message.to_owned()),
    }
}
