//! Backend-as-a-service boundary.
//!
//! The storefront depends on two remote services: an identity provider that
//! issues sessions and emits auth-state events, and a document store holding
//! user profiles and the catalog. Both sit behind traits so the storefront
//! can run against Firebase or entirely in-process.

pub mod documents;
pub mod firebase;
pub mod identity;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

pub use documents::{Document, DocumentStore, DocumentStoreError, Filter, collections};
pub use identity::{
    AuthStateEvent, AuthStateSubscription, FederatedCredential, IdentityError, IdentityService,
    IdentityUser,
};
pub use memory::{InMemoryDocumentStore, InMemoryIdentity};

use crate::config::{BackendKind, ConfigError, FirebaseConfig, StorefrontConfig};

/// Timeout for every request to the hosted backend.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The pair of remote services the storefront is wired to.
#[derive(Clone)]
pub struct Backend {
    pub identity: Arc<dyn IdentityService>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Backend {
    /// A fresh in-memory backend.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            identity: Arc::new(InMemoryIdentity::new()),
            documents: Arc::new(InMemoryDocumentStore::new()),
        }
    }

    /// Firebase Authentication + Firestore.
    ///
    /// Firestore requests run as the signed-in user so security rules apply.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be built.
    pub fn firebase(config: &FirebaseConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("club-clothing/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let identity = firebase::IdentityToolkitClient::new(client.clone(), config);
        let documents = firebase::FirestoreClient::with_identity(client, config, identity.clone());

        Ok(Self {
            identity: Arc::new(identity),
            documents: Arc::new(documents),
        })
    }

    /// Build the backend selected by configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if Firebase is selected without its settings or
    /// the HTTP client cannot be built.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, ConfigError> {
        match config.backend {
            BackendKind::Memory => Ok(Self::memory()),
            BackendKind::Firebase => {
                let firebase = config
                    .firebase
                    .as_ref()
                    .ok_or_else(|| ConfigError::MissingEnvVar("FIREBASE_PROJECT_ID".to_string()))?;
                Self::firebase(firebase)
                    .map_err(|e| ConfigError::InvalidEnvVar("CLUB_BACKEND".to_string(), e.to_string()))
            }
        }
    }
}
