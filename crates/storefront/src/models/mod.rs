//! Domain models stored in the document store.

pub mod catalog;
pub mod user;

pub use catalog::{Category, Product};
pub use user::UserProfile;
