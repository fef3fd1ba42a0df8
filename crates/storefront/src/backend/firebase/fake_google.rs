//! Local stand-in for the Google REST endpoints, for tests.
//!
//! Every request is recorded and answered by a plain function, so a test can
//! script expiry, rejection and refresh without network access.

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, Uri, header},
};
use secrecy::SecretString;
use serde_json::Value;
use url::Url;

use crate::config::FirebaseConfig;

/// One request as the server saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: String,
    pub bearer: Option<String>,
    pub body: String,
}

/// Answers a recorded request with a status and JSON body.
pub type Responder = fn(&Recorded) -> (StatusCode, Value);

pub struct FakeGoogle {
    base: Url,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeGoogle {
    /// Serve `respond` on an ephemeral local port.
    pub async fn start(respond: Responder) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = requests.clone();

        let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap, body: String| {
            let log = log.clone();
            async move {
                let recorded = Recorded {
                    path: uri.path().to_owned(),
                    query: uri.query().unwrap_or_default().to_owned(),
                    bearer: headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.strip_prefix("Bearer "))
                        .map(str::to_owned),
                    body,
                };
                let (status, value) = respond(&recorded);
                log.lock().unwrap().push(recorded);
                (status, Json(value))
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: Url::parse(&format!("http://{addr}/v1/")).unwrap(),
            requests,
        }
    }

    /// A config whose every endpoint points at this server.
    pub fn config(&self) -> FirebaseConfig {
        FirebaseConfig {
            project_id: "club-clothing".to_owned(),
            api_key: SecretString::from("AIzaSyD-k3yValue".to_owned()),
            identity_url: self.base.clone(),
            firestore_url: self.base.clone(),
            token_url: self.base.clone(),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose path ends with `suffix`.
    pub fn requests_to(&self, suffix: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }
}
