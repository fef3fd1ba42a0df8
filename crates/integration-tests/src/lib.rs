//! Integration tests for Club Clothing.
//!
//! Each test spawns the storefront router on an ephemeral port, backed by
//! the in-memory identity provider and document store, and talks to it
//! over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p club-clothing-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `catalog` - Home, explore and category pages
//! - `cart` - Cart mutations and totals
//! - `session` - Sign-up, sign-in, sign-out and the checkout guard

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::task::JoinHandle;

use club_clothing_core::{CategoryId, ProductId};
use club_clothing_storefront::{
    backend::Backend,
    config::StorefrontConfig,
    models::{Category, Product},
    routes,
    state::AppState,
};

/// Password used by [`TestApp::sign_up`].
pub const TEST_PASSWORD: &str = "correct-horse";

/// A storefront running on a local port.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub state: AppState,
    server: JoinHandle<()>,
}

/// Two categories: hats (`hat-1` at 10, `hat-2` at 18) and jackets
/// (`jacket-1` at 125).
#[must_use]
pub fn test_catalog() -> Vec<Category> {
    let product = |id: &str, name: &str, price: i64| Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        price: Decimal::from(price),
        image_url: format!("https://img.example/{id}.png"),
    };

    vec![
        Category {
            id: CategoryId::new("hats"),
            name: "hats".to_owned(),
            display_name: "Hats".to_owned(),
            image_url: "https://img.example/hats.png".to_owned(),
            products: vec![
                product("hat-1", "Brown Brim", 10),
                product("hat-2", "Blue Beanie", 18),
            ],
        },
        Category {
            id: CategoryId::new("jackets"),
            name: "jackets".to_owned(),
            display_name: "Jackets".to_owned(),
            image_url: "https://img.example/jackets.png".to_owned(),
            products: vec![product("jacket-1", "Black Jean Shearling", 125)],
        },
    ]
}

impl TestApp {
    /// Start a storefront with the memory backend and [`test_catalog`].
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind or the catalog cannot be seeded.
    pub async fn spawn() -> Self {
        let config = StorefrontConfig::memory(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let state = AppState::new(config, Backend::memory());
        state
            .catalog()
            .seed(&test_catalog())
            .await
            .expect("Failed to seed catalog");

        let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let app = routes::app(state.clone());
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        state.session().wait_until_initialized().await;

        Self {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            state,
            server,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send request")
    }

    /// # Panics
    ///
    /// Panics if the request cannot be sent.
    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Create an account through `/sign-up` and return the response body.
    ///
    /// # Panics
    ///
    /// Panics if the request fails or the body is not JSON.
    pub async fn sign_up(&self, email: &str) -> Value {
        let resp = self
            .post(
                "/sign-up",
                &serde_json::json!({
                    "firstName": "Ana",
                    "lastName": "Souza",
                    "email": email,
                    "password": TEST_PASSWORD,
                    "passwordConfirmation": TEST_PASSWORD,
                }),
            )
            .await;
        assert!(resp.status().is_success(), "sign-up failed: {}", resp.status());
        resp.json().await.expect("Failed to parse sign-up response")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}
