//! Authentication and the local session lifecycle.
//!
//! This module provides:
//! - `SessionManager`: the cached identity with a fixed time-to-live
//! - `SessionTimer`: the expiry poll started by `start_session_timer`
//! - `AuthService`: sign-in, sign-up, logout and restore flows that feed the manager
//!
//! Sessions are persisted to a single storage slot and expire after 24 hours
//! unless extended.

pub mod error;
pub mod flow;
pub mod session;
pub mod timer;

pub use error::AuthError;
pub use flow::{AuthService, AuthState};
pub use session::{
    ExtendOutcome, SessionError, SessionManager, SessionRecord, SessionSettings, SESSION_KEY,
    SESSION_POLL_INTERVAL_SECS, SESSION_TTL_HOURS,
};
pub use timer::{ExpireCallback, SessionTimer, TimerExit};
