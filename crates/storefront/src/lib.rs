//! Club Clothing storefront library.
//!
//! Session and cart state for a single storefront client, the identity and
//! document-store backends they sync with, and the JSON surface the view
//! layer talks to. Exposed as a library so the binary, the CLI and the
//! integration tests share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod config;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
