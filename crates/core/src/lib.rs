//! Club Clothing Core - Shared types library.
//!
//! This crate provides common types used across all Club Clothing components:
//! - `storefront` - Session, cart and catalog core plus the JSON storefront surface
//! - `cli` - Command-line tools for seeding the catalog and managing users
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no backend clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for identifiers, prices, emails, and auth providers

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
