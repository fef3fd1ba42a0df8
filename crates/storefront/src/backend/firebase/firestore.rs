//! Firestore REST client.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};
use url::Url;

use super::identity::IdentityToolkitClient;
use super::values::{decode_fields, encode_fields, encode_value};
use super::error_message;
use crate::backend::documents::{Document, DocumentStore, DocumentStoreError, Filter};
use crate::config::FirebaseConfig;

/// Client for a project's default Firestore database.
#[derive(Clone)]
pub struct FirestoreClient {
    inner: Arc<FirestoreInner>,
}

struct FirestoreInner {
    client: reqwest::Client,
    /// `.../projects/{project}/databases/(default)/documents`
    documents_root: String,
    api_key: SecretString,
    /// Source of the signed-in user's id token, when requests should run as
    /// that user.
    identity: Option<IdentityToolkitClient>,
}

/// One row of a `runQuery` response. Rows without a document only carry
/// read-time metadata.
#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreClient {
    /// Create a client that authenticates with the API key only.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &FirebaseConfig) -> Self {
        Self::build(client, config, None)
    }

    /// Create a client that also sends the signed-in user's id token.
    #[must_use]
    pub fn with_identity(
        client: reqwest::Client,
        config: &FirebaseConfig,
        identity: IdentityToolkitClient,
    ) -> Self {
        Self::build(client, config, Some(identity))
    }

    fn build(
        client: reqwest::Client,
        config: &FirebaseConfig,
        identity: Option<IdentityToolkitClient>,
    ) -> Self {
        let documents_root = format!(
            "{}/projects/{}/databases/(default)/documents",
            config.firestore_url.as_str().trim_end_matches('/'),
            config.project_id
        );
        Self {
            inner: Arc::new(FirestoreInner {
                client,
                documents_root,
                api_key: config.api_key.clone(),
                identity,
            }),
        }
    }

    fn url(&self, suffix: &str) -> Result<Url, DocumentStoreError> {
        let mut url = Url::parse(&format!("{}{suffix}", self.inner.documents_root))
            .map_err(|e| DocumentStoreError::Decode(format!("invalid firestore url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());
        Ok(url)
    }

    /// POST as the signed-in user when there is one. A 401 on a user token
    /// is retried once with a refreshed token, or with the API key alone if
    /// the refresh fails.
    async fn post(&self, url: Url, body: &Value) -> Result<String, DocumentStoreError> {
        let token = match &self.inner.identity {
            Some(identity) => identity.id_token().await,
            None => None,
        };

        let (mut status, mut text) = self.send(url.clone(), body, token.as_ref()).await?;

        if status == StatusCode::UNAUTHORIZED && token.is_some() {
            let refreshed = match &self.inner.identity {
                Some(identity) => identity.refresh_id_token().await,
                None => None,
            };
            debug!(refreshed = refreshed.is_some(), "retrying unauthenticated request");
            (status, text) = self.send(url, body, refreshed.as_ref()).await?;
        }

        if !status.is_success() {
            let message = error_message(&text);
            debug!(%status, message = %message, "firestore rejected request");
            return Err(DocumentStoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(text)
    }

    async fn send(
        &self,
        url: Url,
        body: &Value,
        token: Option<&SecretString>,
    ) -> Result<(StatusCode, String), DocumentStoreError> {
        let mut request = self.inner.client.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        Ok((status, response.text().await?))
    }

    async fn run_query(&self, structured_query: Value) -> Result<Vec<Document>, DocumentStoreError> {
        let text = self
            .post(
                self.url(":runQuery")?,
                &json!({ "structuredQuery": structured_query }),
            )
            .await?;

        let rows: Vec<QueryRow> = serde_json::from_str(&text)?;
        rows.into_iter()
            .filter_map(|row| row.document)
            .map(|document| decode_fields(&document.fields))
            .collect()
    }
}

/// Build a `structuredQuery` over one collection.
fn structured_query(collection: &str, filter: Option<&Filter>) -> Value {
    let mut query = json!({ "from": [{ "collectionId": collection }] });
    if let Some(filter) = filter {
        query["where"] = json!({
            "fieldFilter": {
                "field": { "fieldPath": filter.field },
                "op": "EQUAL",
                "value": encode_value(&filter.value),
            }
        });
    }
    query
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self), fields(field = %filter.field))]
    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        self.run_query(structured_query(collection, Some(filter)))
            .await
    }

    #[instrument(skip(self))]
    async fn list(&self, collection: &str) -> Result<Vec<Document>, DocumentStoreError> {
        self.run_query(structured_query(collection, None)).await
    }

    #[instrument(skip(self, document))]
    async fn insert(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<(), DocumentStoreError> {
        self.post(
            self.url(&format!("/{collection}"))?,
            &json!({ "fields": encode_fields(&document) }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use club_clothing_core::Email;

    use super::*;
    use crate::backend::firebase::fake_google::{FakeGoogle, Recorded};
    use crate::backend::identity::IdentityService;

    fn client() -> FirestoreClient {
        FirestoreClient::new(
            reqwest::Client::new(),
            &FirebaseConfig {
                project_id: "club-clothing".to_owned(),
                api_key: SecretString::from("AIzaSyD-k3yValue".to_owned()),
                identity_url: Url::parse("https://identitytoolkit.googleapis.com/v1/").unwrap(),
                firestore_url: Url::parse("https://firestore.googleapis.com/v1/").unwrap(),
                token_url: Url::parse("https://securetoken.googleapis.com/v1/").unwrap(),
            },
        )
    }

    #[test]
    fn test_run_query_url() {
        let url = client().url(":runQuery").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/club-clothing/databases/(default)/documents:runQuery?key=AIzaSyD-k3yValue"
        );
    }

    #[test]
    fn test_collection_url() {
        let url = client().url("/users").unwrap();
        assert!(url.path().ends_with("/documents/users"));
    }

    #[test]
    fn test_structured_query_with_filter() {
        let query = structured_query("users", Some(&Filter::eq("id", "abc")));
        assert_eq!(query["from"][0]["collectionId"], "users");
        assert_eq!(query["where"]["fieldFilter"]["field"]["fieldPath"], "id");
        assert_eq!(query["where"]["fieldFilter"]["op"], "EQUAL");
        assert_eq!(
            query["where"]["fieldFilter"]["value"],
            json!({"stringValue": "abc"})
        );
    }

    #[test]
    fn test_structured_query_without_filter() {
        let query = structured_query("categories", None);
        assert!(query.get("where").is_none());
    }

    #[test]
    fn test_query_rows_skip_metadata_only_rows() {
        let body = r#"[
            {"readTime": "2024-01-01T00:00:00Z"},
            {"document": {"name": "projects/p/databases/(default)/documents/users/x",
                          "fields": {"id": {"stringValue": "abc"}}}}
        ]"#;
        let rows: Vec<QueryRow> = serde_json::from_str(body).unwrap();
        let documents: Vec<_> = rows.into_iter().filter_map(|r| r.document).collect();
        assert_eq!(documents.len(), 1);
        assert_eq!(
            decode_fields(&documents[0].fields).unwrap()["id"],
            json!("abc")
        );
    }

    /// Signs in with a token Firestore has already revoked; only the
    /// refreshed token is accepted.
    fn google(request: &Recorded) -> (StatusCode, Value) {
        if request.path.ends_with("/accounts:signInWithPassword") {
            (
                StatusCode::OK,
                json!({
                    "localId": "abc",
                    "idToken": "stale",
                    "refreshToken": "refresh-1",
                    "expiresIn": "3600",
                }),
            )
        } else if request.path.ends_with("/token") {
            (
                StatusCode::OK,
                json!({
                    "id_token": "fresh",
                    "refresh_token": "refresh-2",
                    "expires_in": "3600",
                }),
            )
        } else if request.bearer.as_deref() == Some("stale") {
            (
                StatusCode::UNAUTHORIZED,
                json!({ "error": { "code": 401, "message": "UNAUTHENTICATED" } }),
            )
        } else {
            (StatusCode::OK, json!([]))
        }
    }

    /// Every token is rejected and the refresh token is revoked.
    fn locked_out_google(request: &Recorded) -> (StatusCode, Value) {
        if request.path.ends_with("/token") {
            (
                StatusCode::BAD_REQUEST,
                json!({ "error": { "message": "TOKEN_EXPIRED" } }),
            )
        } else if request.path.ends_with(":runQuery") && request.bearer.is_some() {
            (
                StatusCode::UNAUTHORIZED,
                json!({ "error": { "code": 401, "message": "UNAUTHENTICATED" } }),
            )
        } else {
            google(request)
        }
    }

    async fn signed_in_client(google: &FakeGoogle) -> FirestoreClient {
        let config = google.config();
        let identity = IdentityToolkitClient::new(reqwest::Client::new(), &config);
        identity
            .sign_in_with_password(
                &Email::parse("ana@example.com").unwrap(),
                &SecretString::from("correct-horse".to_owned()),
            )
            .await
            .unwrap();
        FirestoreClient::with_identity(reqwest::Client::new(), &config, identity)
    }

    #[tokio::test]
    async fn test_unauthorized_request_is_retried_with_refreshed_token() {
        let google = FakeGoogle::start(google).await;
        let client = signed_in_client(&google).await;

        assert!(client.list("categories").await.unwrap().is_empty());

        let queries = google.requests_to(":runQuery");
        let bearers: Vec<_> = queries.iter().map(|r| r.bearer.as_deref()).collect();
        assert_eq!(bearers, [Some("stale"), Some("fresh")]);
        assert_eq!(google.requests_to("/token").len(), 1);

        // The refreshed token sticks for later requests.
        client.list("categories").await.unwrap();
        assert_eq!(
            google.requests_to(":runQuery").last().unwrap().bearer.as_deref(),
            Some("fresh")
        );
        assert_eq!(google.requests_to("/token").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_retries_once_with_key_only() {
        let google = FakeGoogle::start(locked_out_google).await;
        let client = signed_in_client(&google).await;

        assert!(client.list("categories").await.unwrap().is_empty());

        let queries = google.requests_to(":runQuery");
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].bearer.as_deref(), Some("stale"));
        assert_eq!(queries[1].bearer, None);
        assert!(queries[1].query.starts_with("key="));
    }

    #[tokio::test]
    async fn test_key_only_client_is_not_retried() {
        let google = FakeGoogle::start(|_| {
            (
                StatusCode::UNAUTHORIZED,
                json!({ "error": { "code": 401, "message": "UNAUTHENTICATED" } }),
            )
        })
        .await;
        let client = FirestoreClient::new(reqwest::Client::new(), &google.config());

        let err = client.list("categories").await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::Rejected { status: 401, .. }));
        assert_eq!(google.requests().len(), 1);
    }
}
