//! Application state shared across handlers.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::Backend;
use crate::cart::Cart;
use crate::config::StorefrontConfig;
use crate::services::{AuthService, CatalogService, CheckoutService};
use crate::session::{SessionHandle, SessionSync};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. It owns the one storefront
/// session: the session worker, the cart, and the services built over the
/// configured backend.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Backend,
    session: SessionHandle,
    cart: Mutex<Cart>,
    auth: AuthService,
    catalog: CatalogService,
    checkout: CheckoutService,
}

impl AppState {
    /// Create the application state and start the session worker.
    ///
    /// Must be called inside a tokio runtime. Call [`AppState::shutdown`]
    /// before exit to stop the worker.
    #[must_use]
    pub fn new(config: StorefrontConfig, backend: Backend) -> Self {
        let session = SessionSync::spawn(backend.identity.clone(), backend.documents.clone());
        let auth = AuthService::new(backend.identity.clone(), backend.documents.clone());
        let catalog = CatalogService::new(backend.documents.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                session,
                cart: Mutex::new(Cart::new()),
                auth,
                catalog,
                checkout: CheckoutService::new(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the backend services.
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Get a reference to the session worker handle.
    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.inner.session
    }

    /// Get a reference to the cart lock.
    #[must_use]
    pub fn cart(&self) -> &Mutex<Cart> {
        &self.inner.cart
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.inner.auth
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Stop the session worker.
    pub async fn shutdown(&self) {
        self.inner.session.shutdown().await;
    }
}
