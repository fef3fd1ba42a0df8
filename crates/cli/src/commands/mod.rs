//! CLI command implementations.

pub mod catalog;
pub mod user;

use club_clothing_storefront::{
    backend::Backend,
    config::{BackendKind, ConfigError, StorefrontConfig},
};

/// Load the storefront configuration and connect to its backend.
///
/// # Errors
///
/// Returns an error if the environment is incomplete.
pub fn connect() -> Result<Backend, ConfigError> {
    let config = StorefrontConfig::from_env()?;
    if config.backend == BackendKind::Memory {
        tracing::warn!("CLUB_BACKEND is memory: changes are discarded on exit");
    }

    let backend = Backend::from_config(&config)?;
    tracing::info!(backend = ?config.backend, "Connected to backend");
    Ok(backend)
}
