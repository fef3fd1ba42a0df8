//! Document store boundary.
//!
//! Documents are schemaless JSON objects grouped into named collections.
//! Typed models convert to and from documents with [`encode`] and [`decode`].

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

/// A schemaless document.
pub type Document = serde_json::Map<String, Value>;

/// Collection names used by the storefront.
pub mod collections {
    /// User profiles, keyed by the `id` field (provider uid).
    pub const USERS: &str = "users";

    /// Product categories with their embedded products.
    pub const CATEGORIES: &str = "categories";
}

/// An equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

impl Filter {
    /// `field == value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether a document satisfies this filter.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        document.get(&self.field) == Some(&self.value)
    }
}

/// Errors reported by a document store.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The store rejected the request.
    #[error("document store rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message from the store.
        message: String,
    },

    /// A document did not have the expected shape.
    #[error("document decode error: {0}")]
    Decode(String),
}

/// Remote document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents in `collection` matching `filter`, in store order.
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DocumentStoreError>;

    /// Every document in `collection`, in store order.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError>;

    /// Add a document to `collection` under a store-assigned key.
    async fn insert(&self, collection: &str, document: Document)
    -> Result<(), DocumentStoreError>;
}

/// Convert a typed value into a document.
///
/// # Errors
///
/// Returns `DocumentStoreError::Decode` if the value does not serialize to a
/// JSON object.
pub fn encode<T: Serialize>(value: &T) -> Result<Document, DocumentStoreError> {
    match serde_json::to_value(value)? {
        Value::Object(document) => Ok(document),
        other => Err(DocumentStoreError::Decode(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Convert a document into a typed value.
///
/// # Errors
///
/// Returns `DocumentStoreError::Decode` if the document does not match `T`.
pub fn decode<T: DeserializeOwned>(document: Document) -> Result<T, DocumentStoreError> {
    serde_json::from_value(Value::Object(document))
        .map_err(|e| DocumentStoreError::Decode(e.to_string()))
}
