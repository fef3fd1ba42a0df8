//! Firebase REST clients.
//!
//! Uses `reqwest` directly against the Identity Toolkit and Firestore REST
//! APIs. Both clients share one `reqwest::Client` and the project's web API
//! key; Firestore requests carry the signed-in user's id token when there is
//! one so security rules see the same identity as the storefront.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod fake_google;
mod firestore;
mod identity;
mod values;

pub use firestore::FirestoreClient;
pub use identity::IdentityToolkitClient;

use serde::Deserialize;

/// Error envelope shared by Google REST APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Extract the error message from a Google REST error body.
///
/// Falls back to a truncated copy of the raw body when it is not the usual
/// `{"error": {"message": ...}}` envelope.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| body.chars().take(200).collect(),
        |envelope| envelope.error.message,
    )
}
