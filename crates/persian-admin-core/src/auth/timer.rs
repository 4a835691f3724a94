use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::session::{SessionError, SessionManager};

/// Invoked once when the timer observes that the session is gone
pub type ExpireCallback = Box<dyn FnOnce() + Send + 'static>;

/// Why a session timer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerExit {
    /// The session expired (or vanished) and the callback, if any, ran
    Expired,
    /// Stopped by `SessionTimer::cancel` or an explicit logout
    Cancelled,
}

/// Handle to a running expiry poll.
///
/// Dropping the handle leaves the poll running; use `cancel` to stop it.
pub struct SessionTimer {
    handle: JoinHandle<TimerExit>,
    cancelled: Arc<AtomicBool>,
}

impl SessionTimer {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the poll to stop
    pub async fn wait(self) -> TimerExit {
        match self.handle.await {
            Ok(exit) => exit,
            Err(_) => TimerExit::Cancelled,
        }
    }
}

impl<P> SessionManager<P>
where
    P: Serialize + DeserializeOwned + 'static,
{
    /// Poll `is_session_valid` now and then every `poll_interval` until the
    /// session is gone, then call `on_expire` once and stop.
    ///
    /// Expiry is detected within one poll interval. An explicit
    /// `clear_session` stops the poll without calling `on_expire`.
    pub fn start_session_timer(
        self: &Arc<Self>,
        on_expire: Option<ExpireCallback>,
    ) -> Result<SessionTimer, SessionError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let manager = Arc::clone(self);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let epoch = manager.logout_epoch();
        let interval = manager.settings().poll_interval;

        let handle = runtime.spawn(async move {
            let stopped = || flag.load(Ordering::SeqCst) || manager.logout_epoch() != epoch;
            loop {
                if stopped() {
                    debug!("Session timer stopped before expiry");
                    return TimerExit::Cancelled;
                }
                if !manager.is_session_valid() {
                    // A logout may have raced the check
                    if stopped() {
                        debug!("Session timer stopped by logout");
                        return TimerExit::Cancelled;
                    }
                    info!("Session expired");
                    if let Some(callback) = on_expire {
                        callback();
                    }
                    return TimerExit::Expired;
                }
                tokio::time::sleep(interval).await;
            }
        });

        Ok(SessionTimer { handle, cancelled })
    }
}
