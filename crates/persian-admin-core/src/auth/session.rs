use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::storage::{SessionStorage, StorageError};

/// Storage slot holding the single session record
pub const SESSION_KEY: &str = "persian_admin_session";

/// Session lifetime in hours.
pub const SESSION_TTL_HOURS: i64 = 24;

/// How often the expiry timer re-checks the session
pub const SESSION_POLL_INTERVAL_SECS: u64 = 60;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No async runtime available to run the session timer")]
    NoRuntime,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub poll_interval: std::time::Duration,
    pub key: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(SESSION_TTL_HOURS),
            poll_interval: std::time::Duration::from_secs(SESSION_POLL_INTERVAL_SECS),
            key: SESSION_KEY.to_string(),
        }
    }
}

/// Persisted form: `{ "user": .., "timestamp": <ms>, "expiresAt": <ms> }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord<P> {
    pub user: P,
    pub timestamp: i64,
    pub expires_at: i64,
}

impl<P> SessionRecord<P> {
    pub fn new(user: P, now_millis: i64, ttl: Duration) -> Self {
        Self {
            user,
            timestamp: now_millis,
            expires_at: now_millis.saturating_add(ttl.num_milliseconds()),
        }
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }

    pub fn remaining_at(&self, now_millis: i64) -> Duration {
        Duration::milliseconds(self.expires_at.saturating_sub(now_millis).max(0))
    }

    /// Whole hours left, floored and never negative
    pub fn hours_remaining_at(&self, now_millis: i64) -> i64 {
        self.expires_at.saturating_sub(now_millis).max(0) / MILLIS_PER_HOUR
    }
}

/// Result of `SessionManager::extend_session`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    Extended,
    NoSession,
}

impl ExtendOutcome {
    pub fn extended(&self) -> bool {
        matches!(self, ExtendOutcome::Extended)
    }
}

/// Owns the locally cached identity and its expiry deadline.
///
/// Build one per process at the composition root and share it through an
/// `Arc`. Expired or corrupt records are deleted the moment any read
/// notices them, so callers only ever see a live profile or nothing.
pub struct SessionManager<P> {
    storage: Arc<dyn SessionStorage>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    /// Bumped on every explicit logout; running timers compare against it
    logout_epoch: AtomicU64,
    _profile: PhantomData<fn() -> P>,
}

impl<P> SessionManager<P>
where
    P: Serialize + DeserializeOwned,
{
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            storage,
            clock,
            settings,
            logout_epoch: AtomicU64::new(0),
            _profile: PhantomData,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Persist `profile` with a fresh full-TTL deadline, replacing any prior record.
    ///
    /// On failure the previously stored record is left as it was.
    pub fn set_session(&self, profile: &P) -> Result<(), SessionError> {
        let record = SessionRecord::new(profile, self.clock.now_millis(), self.settings.ttl);
        let contents = serde_json::to_string(&record)?;
        self.storage.set(&self.settings.key, &contents).map_err(|e| {
            warn!(key = %self.settings.key, error = %e, "Failed to persist session");
            SessionError::from(e)
        })?;
        debug!(expires_at = record.expires_at, "Session stored");
        Ok(())
    }

    /// The stored profile, or `None` if absent, corrupt or expired
    pub fn get_session(&self) -> Option<P> {
        self.current_record().map(|record| record.user)
    }

    /// The full live record including its timestamps
    pub fn current_record(&self) -> Option<SessionRecord<P>> {
        self.current_record_at(self.clock.now_millis())
    }

    /// Like `current_record`, judged against a clock reading the caller
    /// already took
    fn current_record_at(&self, now_millis: i64) -> Option<SessionRecord<P>> {
        let contents = match self.storage.get(&self.settings.key) {
            Ok(Some(contents)) => contents,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.settings.key, error = %e, "Failed to read session");
                return None;
            }
        };

        let record: SessionRecord<P> = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "Discarding unparseable session record");
                self.discard();
                return None;
            }
        };

        if record.is_expired_at(now_millis) {
            debug!(expires_at = record.expires_at, "Discarding expired session record");
            self.discard();
            return None;
        }

        Some(record)
    }

    /// Explicit logout. Removes the record and stops any running expiry timer
    /// without notifying it.
    pub fn clear_session(&self) -> Result<(), SessionError> {
        self.logout_epoch.fetch_add(1, Ordering::SeqCst);
        self.storage.remove(&self.settings.key).map_err(|e| {
            warn!(key = %self.settings.key, error = %e, "Failed to clear session");
            SessionError::from(e)
        })
    }

    pub fn is_session_valid(&self) -> bool {
        self.current_record().is_some()
    }

    /// Whole hours until expiry, floored; 0 when there is no live session
    pub fn remaining_hours(&self) -> i64 {
        let now = self.clock.now_millis();
        self.current_record_at(now)
            .map(|record| record.hours_remaining_at(now))
            .unwrap_or(0)
    }

    /// Exact time until expiry; zero when there is no live session
    pub fn remaining(&self) -> Duration {
        let now = self.clock.now_millis();
        self.current_record_at(now)
            .map(|record| record.remaining_at(now))
            .unwrap_or_else(Duration::zero)
    }

    /// Restart the full TTL window from now for the current profile.
    ///
    /// The deadline is reset, never accumulated.
    pub fn extend_session(&self) -> Result<ExtendOutcome, SessionError> {
        match self.get_session() {
            Some(profile) => {
                self.set_session(&profile)?;
                Ok(ExtendOutcome::Extended)
            }
            None => Ok(ExtendOutcome::NoSession),
        }
    }

    pub(crate) fn logout_epoch(&self) -> u64 {
        self.logout_epoch.load(Ordering::SeqCst)
    }

    /// Self-healing removal; does not count as a logout
    fn discard(&self) {
        if let Err(e) = self.storage.remove(&self.settings.key) {
            warn!(key = %self.settings.key, error = %e, "Failed to remove stale session");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
