//! Session state container.
//!
//! Holds whether the identity provider has reported yet, whether someone is
//! signed in, and their profile. State changes only in response to identity
//! events, one event at a time (see [`sync`]).

pub mod sync;

pub use sync::{SessionHandle, SessionSync};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::backend::{AuthStateEvent, DocumentStore, DocumentStoreError, Filter, IdentityUser, collections};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::UserProfile;

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// `true` until the first identity event has been processed.
    pub is_initializing: bool,
    pub is_authenticated: bool,
    /// Profile of the signed-in user, when one was found.
    pub user: Option<UserProfile>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            is_initializing: true,
            is_authenticated: false,
            user: None,
        }
    }
}

impl SessionState {
    /// Whether authentication and profile agree.
    ///
    /// A signed-in account with no profile document (or a failed lookup)
    /// leaves `is_authenticated` set with no user; views treat that as a
    /// signed-in user they cannot greet by name.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.is_authenticated == self.user.is_some()
    }
}

/// Applies identity events to a [`SessionState`].
///
/// Not synchronized: [`SessionSync`] owns the only instance and feeds it one
/// event at a time.
pub struct SessionContainer {
    state: SessionState,
    documents: Arc<dyn DocumentStore>,
}

impl SessionContainer {
    /// A container in the initializing state.
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            state: SessionState::default(),
            documents,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Apply one identity event.
    ///
    /// Signing out clears the user without a remote call. Signing in looks up
    /// the profile whose `id` is the account uid. Any other transition leaves
    /// the state alone. `is_initializing` is cleared either way.
    pub async fn on_identity_event(&mut self, event: AuthStateEvent) -> &SessionState {
        match (self.state.is_authenticated, event) {
            (true, None) => self.logout(),
            (false, Some(user)) => {
                let profile = self.resolve_profile(&user).await;
                self.login(&user, profile);
            }
            (authenticated, event) => {
                debug!(authenticated, signed_in = event.is_some(), "identity event ignored");
            }
        }

        self.state.is_initializing = false;
        &self.state
    }

    fn login(&mut self, user: &IdentityUser, profile: Option<UserProfile>) {
        set_sentry_user(&user.uid, user.email.as_ref().map(club_clothing_core::Email::as_str));
        self.state.is_authenticated = true;
        self.state.user = profile;
    }

    fn logout(&mut self) {
        clear_sentry_user();
        self.state.is_authenticated = false;
        self.state.user = None;
    }

    /// First `users` document for the account, or `None` when there is none
    /// or the lookup fails.
    async fn resolve_profile(&self, user: &IdentityUser) -> Option<UserProfile> {
        match self.lookup_profile(user).await {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                warn!(uid = %user.uid, "signed in without a profile document");
                None
            }
            Err(e) => {
                error!(uid = %user.uid, error = %e, "profile lookup failed");
                None
            }
        }
    }

    async fn lookup_profile(
        &self,
        user: &IdentityUser,
    ) -> Result<Option<UserProfile>, DocumentStoreError> {
        let documents = self
            .documents
            .query(collections::USERS, &Filter::eq("id", user.uid.as_str()))
            .await?;
        documents
            .into_iter()
            .next()
            .map(UserProfile::from_document)
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::backend::{Document, InMemoryDocumentStore};
    use club_clothing_core::{AuthProvider, Email, UserId};

    fn account(uid: &str) -> IdentityUser {
        IdentityUser {
            uid: UserId::new(uid),
            email: Some(Email::parse("ana@example.com").unwrap()),
            display_name: None,
        }
    }

    fn profile(uid: &str) -> UserProfile {
        UserProfile {
            id: UserId::new(uid),
            email: Email::parse("ana@example.com").unwrap(),
            first_name: "Ana".to_owned(),
            last_name: "Souza".to_owned(),
            provider: AuthProvider::Password,
        }
    }

    async fn store_with(profiles: &[UserProfile]) -> Arc<InMemoryDocumentStore> {
        let store = Arc::new(InMemoryDocumentStore::new());
        for p in profiles {
            store
                .insert(collections::USERS, p.to_document().unwrap())
                .await
                .unwrap();
        }
        store
    }

    struct FailingStore;

    #[async_trait]
    impl DocumentStore for FailingStore {
        async fn query(&self, _: &str, _: &Filter) -> Result<Vec<Document>, DocumentStoreError> {
            Err(DocumentStoreError::Rejected {
                status: 503,
                message: "UNAVAILABLE".to_owned(),
            })
        }

        async fn list(&self, _: &str) -> Result<Vec<Document>, DocumentStoreError> {
            Ok(Vec::new())
        }

        async fn insert(&self, _: &str, _: Document) -> Result<(), DocumentStoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_initial_state() {
        let state = SessionState::default();
        assert!(state.is_initializing);
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert!(state.is_consistent());
    }

    #[tokio::test]
    async fn test_initial_signed_out_event_only_clears_initializing() {
        let mut container = SessionContainer::new(store_with(&[]).await);
        let state = container.on_identity_event(None).await.clone();
        assert_eq!(
            state,
            SessionState {
                is_initializing: false,
                is_authenticated: false,
                user: None,
            }
        );
    }

    #[tokio::test]
    async fn test_sign_in_resolves_first_matching_profile() {
        let mut second = profile("u1");
        second.first_name = "Duplicate".to_owned();
        let store = store_with(&[profile("other"), profile("u1"), second]).await;
        let mut container = SessionContainer::new(store);

        let state = container.on_identity_event(Some(account("u1"))).await;
        assert!(state.is_authenticated);
        assert!(!state.is_initializing);
        assert_eq!(state.user.as_ref().unwrap().first_name, "Ana");
    }

    #[tokio::test]
    async fn test_sign_in_without_profile_is_authenticated_without_user() {
        let mut container = SessionContainer::new(store_with(&[]).await);
        let state = container.on_identity_event(Some(account("u1"))).await;
        assert!(state.is_authenticated);
        assert!(state.user.is_none());
        assert!(!state.is_consistent());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_authenticated_without_user() {
        let mut container = SessionContainer::new(Arc::new(FailingStore));
        let state = container.on_identity_event(Some(account("u1"))).await;
        assert!(state.is_authenticated);
        assert!(state.user.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_from_any_state() {
        let store = store_with(&[profile("u1")]).await;

        let mut container = SessionContainer::new(store.clone());
        container.on_identity_event(Some(account("u1"))).await;
        let state = container.on_identity_event(None).await;
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());

        let mut container = SessionContainer::new(store);
        let state = container.on_identity_event(None).await;
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
    }

    #[tokio::test]
    async fn test_sign_in_while_signed_in_is_ignored() {
        let store = store_with(&[profile("u1"), profile("u2")]).await;
        let mut container = SessionContainer::new(store);
        container.on_identity_event(Some(account("u1"))).await;

        let state = container.on_identity_event(Some(account("u2"))).await;
        assert_eq!(state.user.as_ref().unwrap().id.as_str(), "u1");
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_value(SessionState::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"isInitializing": true, "isAuthenticated": false, "user": null})
        );
    }
}
