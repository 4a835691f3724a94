//! Data models for the admin dashboard.
//!
//! - `UserProfile`: the identity cached in the session slot
//! - `Role`, `UserStatus`: access level and account state
//! - `ProfileUpdate`: partial changes merged into a stored profile

pub mod user;

pub use user::{ProfileUpdate, Role, UserProfile, UserStatus};
