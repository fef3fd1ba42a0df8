//! Authentication provider recorded on user profiles.

use serde::{Deserialize, Serialize};

/// How a user profile was created.
///
/// Stored as lowercase strings (`"password"`, `"google"`) in profile documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Email and password sign-up.
    Password,
    /// Federated Google sign-in.
    Google,
}

impl AuthProvider {
    /// Identifier the identity provider uses for federated sign-in, if any.
    #[must_use]
    pub const fn federated_provider_id(self) -> Option<&'static str> {
        match self {
            Self::Password => None,
            Self::Google => Some("google.com"),
        }
    }
}

impl std::fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password => write!(f, "password"),
            Self::Google => write!(f, "google"),
        }
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid auth provider: {0}")]
pub struct UnknownProvider(pub String);

impl std::str::FromStr for AuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Self::Password),
            "google" => Ok(Self::Google),
            _ => Err(UnknownProvider(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_str() {
        for provider in [AuthProvider::Password, AuthProvider::Google] {
            let parsed: AuthProvider = provider.to_string().parse().unwrap();
            assert_eq!(parsed, provider);
        }
        assert!("github".parse::<AuthProvider>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&AuthProvider::Google).unwrap(),
            "\"google\""
        );
    }

    #[test]
    fn test_federated_provider_id() {
        assert_eq!(AuthProvider::Google.federated_provider_id(), Some("google.com"));
        assert_eq!(AuthProvider::Password.federated_provider_id(), None);
    }
}
