//! User profile documents.

use serde::{Deserialize, Serialize};

use club_clothing_core::{AuthProvider, Email, UserId};

use crate::backend::documents::{Document, DocumentStoreError, decode, encode};

/// A storefront user's profile, stored in the `users` collection.
///
/// Keyed by the identity provider's uid in the `id` field. Created on first
/// sign-up or first federated sign-in and never updated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub provider: AuthProvider,
}

impl UserProfile {
    /// Build a profile from a display name such as `"Ana Souza"`.
    ///
    /// The first word becomes the first name and the second word the last
    /// name; anything after that is dropped.
    #[must_use]
    pub fn from_display_name(
        id: UserId,
        email: Email,
        display_name: Option<&str>,
        provider: AuthProvider,
    ) -> Self {
        let mut words = display_name.unwrap_or_default().split_whitespace();
        Self {
            id,
            email,
            first_name: words.next().unwrap_or_default().to_owned(),
            last_name: words.next().unwrap_or_default().to_owned(),
            provider,
        }
    }

    /// Full name for display.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }

    /// Decode a `users` document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentStoreError::Decode` if the document is not a profile.
    pub fn from_document(document: Document) -> Result<Self, DocumentStoreError> {
        decode(document)
    }

    /// Encode as a `users` document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentStoreError` if serialization fails.
    pub fn to_document(&self) -> Result<Document, DocumentStoreError> {
        encode(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_names_from_display_name() {
        let profile = UserProfile::from_display_name(
            UserId::new("u1"),
            Email::parse("ana@gmail.com").unwrap(),
            Some("Ana Maria Souza"),
            AuthProvider::Google,
        );
        assert_eq!(profile.first_name, "Ana");
        assert_eq!(profile.last_name, "Maria");
        assert_eq!(profile.display_name(), "Ana Maria");
    }

    #[test]
    fn test_missing_display_name_leaves_names_empty() {
        let profile = UserProfile::from_display_name(
            UserId::new("u1"),
            Email::parse("ana@gmail.com").unwrap(),
            None,
            AuthProvider::Google,
        );
        assert_eq!(profile.first_name, "");
        assert_eq!(profile.last_name, "");
        assert_eq!(profile.display_name(), "");
    }

    #[test]
    fn test_document_shape_is_camel_case() {
        let profile = UserProfile {
            id: UserId::new("u1"),
            email: Email::parse("ana@example.com").unwrap(),
            first_name: "Ana".to_owned(),
            last_name: "Souza".to_owned(),
            provider: AuthProvider::Password,
        };
        let document = profile.to_document().unwrap();
        assert_eq!(
            serde_json::Value::Object(document.clone()),
            json!({
                "id": "u1",
                "email": "ana@example.com",
                "firstName": "Ana",
                "lastName": "Souza",
                "provider": "password"
            })
        );
        assert_eq!(UserProfile::from_document(document).unwrap(), profile);
    }
}
