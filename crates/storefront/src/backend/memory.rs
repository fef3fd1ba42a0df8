//! In-process backend.
//!
//! Stands in for the hosted identity service and document store in tests,
//! the CLI's dry runs, and `CLUB_BACKEND=memory` development runs. Passwords
//! are hashed with Argon2id so the memory backend never holds plaintext.

use std::collections::HashMap;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use club_clothing_core::{Email, UserId};

use super::documents::{Document, DocumentStore, DocumentStoreError, Filter};
use super::identity::{
    AuthStateEmitter, AuthStateEvent, AuthStateSubscription, FederatedCredential, IdentityError,
    IdentityService, IdentityUser,
};

/// Minimum password length the hosted provider enforces.
pub const MIN_PASSWORD_LENGTH: usize = 6;

struct PasswordAccount {
    user: IdentityUser,
    password_hash: String,
}

/// In-memory identity service.
pub struct InMemoryIdentity {
    /// Password accounts keyed by lowercase email.
    accounts: RwLock<HashMap<String, PasswordAccount>>,
    /// Federated accounts keyed by `provider:token`.
    federated: RwLock<HashMap<String, IdentityUser>>,
    auth_state: AuthStateEmitter,
}

impl InMemoryIdentity {
    /// Create an empty identity service with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            federated: RwLock::new(HashMap::new()),
            auth_state: AuthStateEmitter::new(),
        }
    }

    /// Register the account a federated credential resolves to.
    ///
    /// The first sign-in with a registered credential behaves like the
    /// provider's popup flow returning that account.
    pub async fn register_federated(&self, credential: &FederatedCredential, user: IdentityUser) {
        self.federated
            .write()
            .await
            .insert(federated_key(credential), user);
    }

    /// Emit an arbitrary auth-state event, as a provider would on token
    /// expiry or a sign-in from another tab.
    pub fn emit(&self, event: AuthStateEvent) {
        self.auth_state.emit(event);
    }
}

impl Default for InMemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentity {
    fn subscribe(&self) -> AuthStateSubscription {
        self.auth_state.subscribe()
    }

    fn current_user(&self) -> AuthStateEvent {
        self.auth_state.current()
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<IdentityUser, IdentityError> {
        let user = {
            let accounts = self.accounts.read().await;
            let account = accounts
                .get(&email.as_str().to_lowercase())
                .ok_or(IdentityError::InvalidCredentials)?;
            verify_password(password.expose_secret(), &account.password_hash)?;
            account.user.clone()
        };

        debug!(uid = %user.uid, "password sign-in");
        self.auth_state.emit(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in_with_federated(
        &self,
        credential: &FederatedCredential,
    ) -> Result<IdentityUser, IdentityError> {
        let user = self
            .federated
            .read()
            .await
            .get(&federated_key(credential))
            .cloned()
            .ok_or_else(|| IdentityError::Provider("INVALID_IDP_RESPONSE".to_owned()))?;

        debug!(uid = %user.uid, provider = %credential.provider(), "federated sign-in");
        self.auth_state.emit(Some(user.clone()));
        Ok(user)
    }

    async fn create_user_with_password(
        &self,
        email: &Email,
        password: &SecretString,
        display_name: Option<&str>,
    ) -> Result<IdentityUser, IdentityError> {
        let password = password.expose_secret();
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::WeakPassword(format!(
                "password should be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }

        let key = email.as_str().to_lowercase();
        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&key) {
                return Err(IdentityError::EmailAlreadyInUse);
            }

            let user = IdentityUser {
                uid: UserId::new(Uuid::new_v4().simple().to_string()),
                email: Some(email.clone()),
                display_name: display_name.map(str::to_owned),
            };
            accounts.insert(
                key,
                PasswordAccount {
                    user: user.clone(),
                    password_hash: hash_password(password)?,
                },
            );
            user
        };

        debug!(uid = %user.uid, "password account created");
        self.auth_state.emit(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.auth_state.current().is_some() {
            self.auth_state.emit(None);
        }
        Ok(())
    }
}

fn federated_key(credential: &FederatedCredential) -> String {
    format!("{}:{}", credential.provider(), credential.token())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, IdentityError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| IdentityError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), IdentityError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| IdentityError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| IdentityError::InvalidCredentials)
}

/// In-memory document store.
///
/// Collections keep insertion order, which is the order queries return.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| filter.matches(document))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<(), DocumentStoreError> {
        self.collections
            .write()
            .await
            .entry(collection.to_owned())
            .or_default()
            .push(document);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_owned())
    }

    #[tokio::test]
    async fn test_create_then_sign_in() {
        let identity = InMemoryIdentity::new();
        let created = identity
            .create_user_with_password(&email("ana@example.com"), &secret("hunter22"), Some("Ana"))
            .await
            .unwrap();

        identity.sign_out().await.unwrap();
        assert_eq!(identity.current_user(), None);

        let signed_in = identity
            .sign_in_with_password(&email("ANA@example.com"), &secret("hunter22"))
            .await
            .unwrap();
        assert_eq!(signed_in.uid, created.uid);
        assert_eq!(identity.current_user(), Some(created));
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let identity = InMemoryIdentity::new();
        identity
            .create_user_with_password(&email("ana@example.com"), &secret("hunter22"), None)
            .await
            .unwrap();

        let result = identity
            .sign_in_with_password(&email("ana@example.com"), &secret("wrong-pass"))
            .await;
        assert!(matches!(result, Err(IdentityError::InvalidCredentials)));

        let result = identity
            .sign_in_with_password(&email("nobody@example.com"), &secret("hunter22"))
            .await;
        assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_duplicate_and_weak_accounts() {
        let identity = InMemoryIdentity::new();
        identity
            .create_user_with_password(&email("ana@example.com"), &secret("hunter22"), None)
            .await
            .unwrap();

        let duplicate = identity
            .create_user_with_password(&email("ana@example.com"), &secret("another1"), None)
            .await;
        assert!(matches!(duplicate, Err(IdentityError::EmailAlreadyInUse)));

        let weak = identity
            .create_user_with_password(&email("bob@example.com"), &secret("123"), None)
            .await;
        assert!(matches!(weak, Err(IdentityError::WeakPassword(_))));
    }

    #[tokio::test]
    async fn test_federated_sign_in_requires_known_credential() {
        let identity = InMemoryIdentity::new();
        let credential = FederatedCredential::Google {
            id_token: "token-1".to_owned(),
        };

        assert!(matches!(
            identity.sign_in_with_federated(&credential).await,
            Err(IdentityError::Provider(_))
        ));

        let user = IdentityUser {
            uid: UserId::new("google-uid"),
            email: Some(email("ana@gmail.com")),
            display_name: Some("Ana Souza".to_owned()),
        };
        identity.register_federated(&credential, user.clone()).await;
        assert_eq!(
            identity.sign_in_with_federated(&credential).await.unwrap(),
            user
        );
    }

    #[tokio::test]
    async fn test_sign_out_when_signed_out_emits_nothing() {
        let identity = InMemoryIdentity::new();
        let mut sub = identity.subscribe();
        identity.sign_out().await.unwrap();
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_document_store_query_and_order() {
        let store = InMemoryDocumentStore::new();
        for (id, name) in [("1", "a"), ("2", "b"), ("1", "c")] {
            store
                .insert(
                    "things",
                    json!({"id": id, "name": name}).as_object().cloned().unwrap(),
                )
                .await
                .unwrap();
        }

        let matches = store.query("things", &Filter::eq("id", "1")).await.unwrap();
        let names: Vec<_> = matches.iter().map(|d| d["name"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("c")]);

        assert_eq!(store.list("things").await.unwrap().len(), 3);
        assert!(store.list("empty").await.unwrap().is_empty());
        assert_eq!(store.len("things").await, 3);
    }
}
