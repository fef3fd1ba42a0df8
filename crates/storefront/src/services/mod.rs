//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Password and Google sign-in, sign-up, sign-out
//! - `catalog` - Category and product reads (cached)
//! - `checkout` - Checkout summary and payment confirmation

pub mod auth;
pub mod catalog;
pub mod checkout;

pub use auth::AuthService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
