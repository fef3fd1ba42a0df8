//! Club Clothing storefront server.
//!
//! This binary serves one storefront client on port 3000.
//!
//! # Architecture
//!
//! - Axum JSON routes consumed by the view layer
//! - Identity provider and document store behind traits: in-memory or
//!   Firebase Authentication + Firestore over REST
//! - A single session worker applies auth-state events in order
//! - The cart lives in process memory for the life of the session

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::Path;

use club_clothing_storefront::{
    backend::Backend,
    config::{BackendKind, StorefrontConfig},
    routes,
    services::catalog::read_seed_file,
    state::AppState,
};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry.dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.sentry.environment.clone().into()),
            sample_rate: config.sentry.sample_rate,
            traces_sample_rate: config.sentry.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Load the seed file into a fresh in-memory catalog.
async fn seed_catalog(state: &AppState, path: &Path) {
    if state.config().backend != BackendKind::Memory {
        tracing::warn!("CATALOG_SEED_PATH is only applied to the memory backend");
        return;
    }

    match read_seed_file(path).await {
        Ok(categories) => {
            if let Err(e) = state.catalog().seed(&categories).await {
                tracing::error!(error = %e, "Failed to seed catalog");
            }
        }
        Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to read seed file"),
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "club_clothing_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let backend = Backend::from_config(&config).expect("Failed to initialize backend");
    tracing::info!(backend = ?config.backend, "Backend initialized");

    // Starts the session worker
    let state = AppState::new(config.clone(), backend);

    if let Some(path) = &config.catalog_seed_path {
        seed_catalog(&state, path).await;
    }

    let app = routes::app(state.clone())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    state.shutdown().await;
    tracing::info!("Session worker stopped");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
