//! Collaborators hosted outside the process.
//!
//! This module provides:
//! - `IdentityProvider`: credential verification and the provider's own sign-in state
//! - `ProfileStore`: the `users` document collection
//! - In-memory implementations of both, used by the CLI and tests
//!
//! Traits use `async_trait` so they can be shared as trait objects.

pub mod error;
pub mod identity;
pub mod profiles;

pub use error::RemoteError;
pub use identity::{Identity, IdentityProvider, MemoryIdentityProvider};
pub use profiles::{seed_demo_users, MemoryProfileStore, ProfileStore, DEMO_PASSWORD};
