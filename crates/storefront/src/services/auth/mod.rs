//! Authentication service.
//!
//! Provides password and Google sign-in and password sign-up against the
//! configured identity provider, and creates the `users` profile document
//! that the session container resolves after every sign-in.

mod error;

pub use error::{AuthError, FieldError, FormErrors, FormField};

use std::sync::Arc;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use club_clothing_core::{AuthProvider, Email};

use crate::backend::memory::MIN_PASSWORD_LENGTH;
use crate::backend::{
    DocumentStore, FederatedCredential, Filter, IdentityError, IdentityService, IdentityUser,
    collections,
};
use crate::models::UserProfile;

/// Result of a sign-in attempt that passed form validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    /// The provider accepted the credentials.
    SignedIn(IdentityUser),
    /// Something went wrong that the form cannot explain. Already logged.
    Failed,
}

/// Email/password sign-in form.
#[derive(Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Account creation form.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

impl std::fmt::Debug for SignUpForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpForm")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("password_confirmation", &"[REDACTED]")
            .finish()
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    identity: Arc<dyn IdentityService>,
    documents: Arc<dyn DocumentStore>,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityService>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            identity,
            documents,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `FormErrors` when a field is missing or malformed, or with
    /// `mismatch` on both fields when the provider rejects the credentials.
    #[instrument(skip_all, fields(email = %form.email))]
    pub async fn login(&self, form: &LoginForm) -> Result<SignInOutcome, FormErrors> {
        let email = validate_login(form)?;
        let password = SecretString::from(form.password.clone());

        match self.identity.sign_in_with_password(&email, &password).await {
            Ok(user) => {
                info!(uid = %user.uid, "signed in with password");
                Ok(SignInOutcome::SignedIn(user))
            }
            Err(IdentityError::InvalidCredentials) => {
                let mut errors = FormErrors::default();
                errors.insert(FormField::Email, FieldError::Mismatch);
                errors.insert(FormField::Password, FieldError::Mismatch);
                Err(errors)
            }
            Err(e) => {
                error!(error = %e, "password sign-in failed");
                Ok(SignInOutcome::Failed)
            }
        }
    }

    /// Create a password account and its profile.
    ///
    /// # Errors
    ///
    /// Returns `FormErrors` when validation fails, or `alreadyInUse` on the
    /// email field when an account with that email exists.
    #[instrument(skip_all, fields(email = %form.email))]
    pub async fn sign_up(&self, form: &SignUpForm) -> Result<SignInOutcome, FormErrors> {
        let email = validate_sign_up(form)?;
        let password = SecretString::from(form.password.clone());
        let display_name = format!("{} {}", form.first_name.trim(), form.last_name.trim());

        let user = match self
            .identity
            .create_user_with_password(&email, &password, Some(&display_name))
            .await
        {
            Ok(user) => user,
            Err(IdentityError::EmailAlreadyInUse) => {
                let mut errors = FormErrors::default();
                errors.insert(FormField::Email, FieldError::AlreadyInUse);
                return Err(errors);
            }
            Err(e) => {
                error!(error = %e, "account creation failed");
                return Ok(SignInOutcome::Failed);
            }
        };

        let profile = UserProfile {
            id: user.uid.clone(),
            email,
            first_name: form.first_name.trim().to_owned(),
            last_name: form.last_name.trim().to_owned(),
            provider: AuthProvider::Password,
        };
        if let Err(e) = self.insert_profile(&profile).await {
            // The account exists and is signed in; only the profile is missing.
            error!(uid = %user.uid, error = %e, "failed to store new profile");
        } else {
            info!(uid = %user.uid, "account created");
        }

        Ok(SignInOutcome::SignedIn(user))
    }

    // =========================================================================
    // Federated Authentication
    // =========================================================================

    /// Sign in with a Google id token, creating the profile on first use.
    ///
    /// Every failure is logged and reported as [`SignInOutcome::Failed`].
    #[instrument(skip_all, fields(provider = %credential.provider()))]
    pub async fn sign_in_with_google(&self, credential: &FederatedCredential) -> SignInOutcome {
        match self.google_sign_in(credential).await {
            Ok(user) => SignInOutcome::SignedIn(user),
            Err(e) => {
                error!(error = %e, "google sign-in failed");
                SignInOutcome::Failed
            }
        }
    }

    async fn google_sign_in(
        &self,
        credential: &FederatedCredential,
    ) -> Result<IdentityUser, AuthError> {
        let user = self.identity.sign_in_with_federated(credential).await?;

        let existing = self
            .documents
            .query(collections::USERS, &Filter::eq("id", user.uid.as_str()))
            .await?;
        if !existing.is_empty() {
            info!(uid = %user.uid, "signed in with google");
            return Ok(user);
        }

        let Some(email) = user.email.clone() else {
            warn!(uid = %user.uid, "google account has no email, profile not created");
            return Ok(user);
        };

        let profile = UserProfile::from_display_name(
            user.uid.clone(),
            email,
            user.display_name.as_deref(),
            AuthProvider::Google,
        );
        self.insert_profile(&profile).await?;
        info!(uid = %user.uid, "created profile on first google sign-in");

        Ok(user)
    }

    // =========================================================================
    // Sign out
    // =========================================================================

    /// Sign out of the identity provider. Failures are logged.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) {
        if let Err(e) = self.identity.sign_out().await {
            error!(error = %e, "sign-out failed");
        }
    }

    async fn insert_profile(&self, profile: &UserProfile) -> Result<(), AuthError> {
        self.documents
            .insert(collections::USERS, profile.to_document()?)
            .await?;
        Ok(())
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Check the email field: required, then well-formed.
fn validate_email(raw: &str, errors: &mut FormErrors) -> Option<Email> {
    if raw.trim().is_empty() {
        errors.insert(FormField::Email, FieldError::Required);
        return None;
    }
    match Email::parse(raw) {
        Ok(email) => Some(email),
        Err(_) => {
            errors.insert(FormField::Email, FieldError::Validate);
            None
        }
    }
}

fn require(value: &str, field: FormField, errors: &mut FormErrors) -> bool {
    if value.trim().is_empty() {
        errors.insert(field, FieldError::Required);
        false
    } else {
        true
    }
}

fn validate_login(form: &LoginForm) -> Result<Email, FormErrors> {
    let mut errors = FormErrors::default();
    let email = validate_email(&form.email, &mut errors);
    // Passwords are not trimmed, only checked for presence.
    if form.password.is_empty() {
        errors.insert(FormField::Password, FieldError::Required);
    }
    match email {
        Some(email) if errors.is_empty() => Ok(email),
        _ => Err(errors),
    }
}

fn validate_sign_up(form: &SignUpForm) -> Result<Email, FormErrors> {
    let mut errors = FormErrors::default();
    require(&form.first_name, FormField::FirstName, &mut errors);
    require(&form.last_name, FormField::LastName, &mut errors);
    let email = validate_email(&form.email, &mut errors);

    if form.password.is_empty() {
        errors.insert(FormField::Password, FieldError::Required);
    } else if form.password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.insert(FormField::Password, FieldError::MinLength);
    }

    if form.password_confirmation.is_empty() {
        errors.insert(FormField::PasswordConfirmation, FieldError::Required);
    } else if form.password_confirmation != form.password {
        errors.insert(FormField::PasswordConfirmation, FieldError::Validate);
    }

    match email {
        Some(email) if errors.is_empty() => Ok(email),
        _ => Err(errors),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryDocumentStore, InMemoryIdentity};
    use club_clothing_core::UserId;

    struct Fixture {
        identity: Arc<InMemoryIdentity>,
        documents: Arc<InMemoryDocumentStore>,
        service: AuthService,
    }

    fn fixture() -> Fixture {
        let identity = Arc::new(InMemoryIdentity::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let service = AuthService::new(identity.clone(), documents.clone());
        Fixture {
            identity,
            documents,
            service,
        }
    }

    fn sign_up_form(email: &str) -> SignUpForm {
        SignUpForm {
            first_name: "Ana".to_owned(),
            last_name: "Souza".to_owned(),
            email: email.to_owned(),
            password: "hunter22".to_owned(),
            password_confirmation: "hunter22".to_owned(),
        }
    }

    fn login_form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.to_owned(),
            password: password.to_owned(),
        }
    }

    #[test]
    fn test_login_validation() {
        let errors = validate_login(&login_form("", "")).unwrap_err();
        assert_eq!(errors.get(FormField::Email), Some(FieldError::Required));
        assert_eq!(errors.get(FormField::Password), Some(FieldError::Required));

        let errors = validate_login(&login_form("not-an-email", "pw")).unwrap_err();
        assert_eq!(errors.get(FormField::Email), Some(FieldError::Validate));
        assert_eq!(errors.get(FormField::Password), None);

        assert!(validate_login(&login_form("ana@example.com", "pw")).is_ok());
    }

    #[test]
    fn test_sign_up_validation() {
        let mut form = sign_up_form("ana@example.com");
        form.first_name = " ".to_owned();
        form.password = "12345".to_owned();
        form.password_confirmation = "123456".to_owned();

        let errors = validate_sign_up(&form).unwrap_err();
        assert_eq!(errors.get(FormField::FirstName), Some(FieldError::Required));
        assert_eq!(errors.get(FormField::LastName), None);
        assert_eq!(errors.get(FormField::Password), Some(FieldError::MinLength));
        assert_eq!(
            errors.get(FormField::PasswordConfirmation),
            Some(FieldError::Validate)
        );

        assert!(validate_sign_up(&sign_up_form("ana@example.com")).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_credentials_mark_both_fields() {
        let f = fixture();
        f.service
            .sign_up(&sign_up_form("ana@example.com"))
            .await
            .unwrap();
        f.service.sign_out().await;

        let errors = f
            .service
            .login(&login_form("ana@example.com", "wrong-password"))
            .await
            .unwrap_err();
        assert_eq!(errors.get(FormField::Email), Some(FieldError::Mismatch));
        assert_eq!(errors.get(FormField::Password), Some(FieldError::Mismatch));

        let outcome = f
            .service
            .login(&login_form("ana@example.com", "hunter22"))
            .await
            .unwrap();
        assert!(matches!(outcome, SignInOutcome::SignedIn(_)));
    }

    #[tokio::test]
    async fn test_sign_up_stores_password_profile() {
        let f = fixture();
        let SignInOutcome::SignedIn(user) = f
            .service
            .sign_up(&sign_up_form("ana@example.com"))
            .await
            .unwrap()
        else {
            panic!("sign-up failed");
        };

        let documents = f
            .documents
            .query(collections::USERS, &Filter::eq("id", user.uid.as_str()))
            .await
            .unwrap();
        let profile = UserProfile::from_document(documents[0].clone()).unwrap();
        assert_eq!(profile.first_name, "Ana");
        assert_eq!(profile.last_name, "Souza");
        assert_eq!(profile.provider, AuthProvider::Password);
        assert_eq!(user.display_name.as_deref(), Some("Ana Souza"));
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_is_already_in_use() {
        let f = fixture();
        f.service
            .sign_up(&sign_up_form("ana@example.com"))
            .await
            .unwrap();

        let errors = f
            .service
            .sign_up(&sign_up_form("Ana@Example.com"))
            .await
            .unwrap_err();
        assert_eq!(errors.get(FormField::Email), Some(FieldError::AlreadyInUse));
        assert_eq!(f.documents.len(collections::USERS).await, 1);
    }

    #[tokio::test]
    async fn test_google_first_sign_in_creates_profile_once() {
        let f = fixture();
        let credential = FederatedCredential::Google {
            id_token: "google-token".to_owned(),
        };
        f.identity
            .register_federated(
                &credential,
                IdentityUser {
                    uid: UserId::new("g-1"),
                    email: Some(Email::parse("ana@gmail.com").unwrap()),
                    display_name: Some("Ana Souza".to_owned()),
                },
            )
            .await;

        let outcome = f.service.sign_in_with_google(&credential).await;
        assert!(matches!(outcome, SignInOutcome::SignedIn(_)));
        assert_eq!(f.documents.len(collections::USERS).await, 1);

        f.service.sign_out().await;
        f.service.sign_in_with_google(&credential).await;
        assert_eq!(f.documents.len(collections::USERS).await, 1);

        let documents = f.documents.list(collections::USERS).await.unwrap();
        let profile = UserProfile::from_document(documents[0].clone()).unwrap();
        assert_eq!(profile.provider, AuthProvider::Google);
        assert_eq!(profile.first_name, "Ana");
        assert_eq!(profile.last_name, "Souza");
    }

    #[tokio::test]
    async fn test_unknown_google_credential_fails_quietly() {
        let f = fixture();
        let outcome = f
            .service
            .sign_in_with_google(&FederatedCredential::Google {
                id_token: "forged".to_owned(),
            })
            .await;
        assert_eq!(outcome, SignInOutcome::Failed);
        assert_eq!(f.documents.len(collections::USERS).await, 0);
    }
}
