//! Persian Admin core library.
//!
//! Keeps the signed-in dashboard user cached locally across restarts with a
//! fixed time-to-live, and provides the authentication flow that feeds it.

pub mod auth;
pub mod clock;
pub mod config;
pub mod models;
pub mod remote;
pub mod storage;
pub mod utils;

pub use auth::{AuthError, AuthService, SessionManager, SessionSettings};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use models::{Role, UserProfile};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
