//! Customer account management.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::info;

use club_clothing_core::UserId;
use club_clothing_storefront::backend::{DocumentStoreError, Filter, collections};
use club_clothing_storefront::models::UserProfile;
use club_clothing_storefront::services::AuthService;
use club_clothing_storefront::services::auth::{FormErrors, SignInOutcome, SignUpForm};

use super::connect;

/// User command errors.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("{0} not set")]
    MissingPassword(String),

    #[error("invalid account details: {0}")]
    Invalid(FormErrors),

    #[error("identity provider rejected the request, see the log above")]
    Failed,

    #[error("no profile for uid {0}")]
    NotFound(UserId),

    #[error(transparent)]
    Documents(#[from] DocumentStoreError),

    #[error(transparent)]
    Config(#[from] club_clothing_storefront::config::ConfigError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Create a password account and its profile.
///
/// The password is read from the `password_env` environment variable so it
/// never appears in shell history.
///
/// # Errors
///
/// Returns an error if the password is unset, the details fail the sign-up
/// form's validation, or the identity provider fails.
pub async fn create(
    email: &str,
    first_name: &str,
    last_name: &str,
    password_env: &str,
) -> Result<(), UserError> {
    dotenvy::dotenv().ok();
    let password = std::env::var(password_env)
        .map(SecretString::from)
        .map_err(|_| UserError::MissingPassword(password_env.to_owned()))?;

    let backend = connect()?;
    let auth = AuthService::new(backend.identity, backend.documents);

    let form = SignUpForm {
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        email: email.to_owned(),
        password: password.expose_secret().to_owned(),
        password_confirmation: password.expose_secret().to_owned(),
    };

    let outcome = auth.sign_up(&form).await.map_err(UserError::Invalid)?;
    let SignInOutcome::SignedIn(user) = outcome else {
        return Err(UserError::Failed);
    };
    info!(uid = %user.uid, email, "Created user");

    // Sign-up leaves the new account signed in on this client.
    auth.sign_out().await;
    Ok(())
}

/// Print the stored profile for `uid` as JSON.
///
/// # Errors
///
/// Returns an error if no profile exists or the lookup fails.
pub async fn show(uid: &str) -> Result<(), UserError> {
    let uid = UserId::new(uid);
    let backend = connect()?;

    let document = backend
        .documents
        .query(collections::USERS, &Filter::eq("id", uid.as_str()))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| UserError::NotFound(uid.clone()))?;
    let profile = UserProfile::from_document(document)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    }
    Ok(())
}
