use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::error::AuthError;
use super::session::{ExtendOutcome, SessionManager};
use super::timer::SessionTimer;
use crate::models::{ProfileUpdate, Role, UserProfile};
use crate::remote::{Identity, IdentityProvider, ProfileStore};
use crate::utils::email_local_part;

/// What the application shell renders from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub current_identity: Option<Identity>,
    pub profile: Option<UserProfile>,
    /// Whole hours left on the cached session
    pub session_hours: i64,
}

impl AuthState {
    fn sign_out(&mut self) {
        self.current_identity = None;
        self.profile = None;
        self.session_hours = 0;
    }
}

/// Authentication flow. Verifies credentials with the identity provider,
/// hydrates the profile from the users collection and hands it to the
/// session manager.
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    sessions: Arc<SessionManager<UserProfile>>,
    state: Arc<RwLock<AuthState>>,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        sessions: Arc<SessionManager<UserProfile>>,
    ) -> Self {
        Self {
            identity,
            profiles,
            sessions,
            state: Arc::new(RwLock::new(AuthState::default())),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager<UserProfile>> {
        &self.sessions
    }

    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.state.read().profile.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().profile.is_some()
    }

    /// Role gate for protected screens
    pub fn has_role(&self, role: Role) -> bool {
        self.state
            .read()
            .profile
            .as_ref()
            .map(|p| p.role == role)
            .unwrap_or(false)
    }

    // =========================================================================
    // Sign up / sign in / logout
    // =========================================================================

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Option<Role>,
    ) -> Result<UserProfile, AuthError> {
        let identity = self.identity.sign_up(email, password, name).await?;
        self.state.write().current_identity = Some(identity.clone());

        let profile = UserProfile::new(name, email, role.unwrap_or_default()).with_id(&identity.uid);
        let profile = match self.profiles.create(profile).await {
            Ok(profile) => profile,
            Err(e) => {
                self.state.write().sign_out();
                return Err(e.into());
            }
        };

        info!(email = %profile.email, "Signed up");
        self.establish(profile)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, AuthError> {
        let identity = self.identity.sign_in(email, password).await?;
        self.state.write().current_identity = Some(identity.clone());

        let profile = match self.hydrate(&identity).await {
            Some(profile) => profile,
            None => basic_profile(&identity, Role::User),
        };

        info!(email = %profile.email, "Signed in");
        self.establish(profile)
    }

    /// Clear the local session and state, then sign out remotely.
    ///
    /// Local state is cleared even when the remote sign-out fails.
    pub async fn logout(&self) -> Result<(), AuthError> {
        if let Err(e) = self.sessions.clear_session() {
            warn!(error = %e, "Session slot could not be cleared on logout");
        }
        self.state.write().sign_out();

        self.identity.sign_out().await.map_err(|e| {
            warn!(error = %e, "Remote sign-out failed");
            AuthError::from(e)
        })?;
        info!("Logged out");
        Ok(())
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Save changes to the signed-in user's profile and re-cache it with a
    /// fresh session deadline.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, AuthError> {
        let id = self
            .state
            .read()
            .profile
            .as_ref()
            .and_then(|p| p.id.clone())
            .ok_or(AuthError::NotSignedIn)?;

        let updated = self.profiles.update(&id, update).await?;
        self.sessions.set_session(&updated)?;

        let mut state = self.state.write();
        state.profile = Some(updated.clone());
        state.session_hours = self.sessions.remaining_hours();
        Ok(updated)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Page-load path. A cached session wins; otherwise fall back to the
    /// identity provider's own sign-in state.
    pub async fn restore(&self) -> Result<Option<UserProfile>, AuthError> {
        if let Some(profile) = self.sessions.get_session() {
            debug!(email = %profile.email, "Restored cached session");
            let mut state = self.state.write();
            state.profile = Some(profile.clone());
            state.session_hours = self.sessions.remaining_hours();
            return Ok(Some(profile));
        }

        match self.identity.current_identity().await {
            Some(identity) => {
                self.state.write().current_identity = Some(identity.clone());
                let profile = match self.hydrate(&identity).await {
                    Some(profile) => profile,
                    None => {
                        // First sign-in on this deployment: record the profile
                        let profile = basic_profile(&identity, Role::Admin);
                        match self.profiles.create(profile.clone()).await {
                            Ok(created) => created,
                            Err(e) => {
                                debug!(error = %e, "Basic profile not stored");
                                profile
                            }
                        }
                    }
                };
                self.establish(profile).map(Some)
            }
            None => {
                self.state.write().sign_out();
                if let Err(e) = self.sessions.clear_session() {
                    warn!(error = %e, "Failed to clear session slot");
                }
                Ok(None)
            }
        }
    }

    pub fn extend_session(&self) -> Result<ExtendOutcome, AuthError> {
        let outcome = self.sessions.extend_session()?;
        if outcome.extended() {
            self.state.write().session_hours = self.sessions.remaining_hours();
        }
        Ok(outcome)
    }

    /// Periodic tick for the session countdown. Drops the signed-in state
    /// once the cached session is gone.
    pub fn refresh_session_time(&self) -> i64 {
        let hours = self.sessions.remaining_hours();
        let valid = self.sessions.is_session_valid();

        let mut state = self.state.write();
        if valid {
            state.session_hours = hours;
        } else if state.profile.is_some() {
            info!("Session ended");
            state.sign_out();
        }
        state.session_hours
    }

    /// Start the expiry poll; when it fires the signed-in state is dropped.
    pub fn start_expiry_watch(&self) -> Result<SessionTimer, AuthError> {
        let state = Arc::clone(&self.state);
        let timer = self.sessions.start_session_timer(Some(Box::new(move || {
            state.write().sign_out();
        })))?;
        Ok(timer)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Look the profile up by account id, then by email. Store errors count
    /// as not found.
    async fn hydrate(&self, identity: &Identity) -> Option<UserProfile> {
        match self.profiles.get_by_id(&identity.uid).await {
            Ok(Some(profile)) => return Some(profile),
            Ok(None) => {}
            Err(e) => debug!(uid = %identity.uid, error = %e, "Profile lookup by id failed"),
        }
        match self.profiles.get_by_email(&identity.email).await {
            Ok(found) => found,
            Err(e) => {
                debug!(email = %identity.email, error = %e, "Profile lookup by email failed");
                None
            }
        }
    }

    /// Cache `profile` and mark it signed in. A failed write leaves the user
    /// signed out.
    fn establish(&self, profile: UserProfile) -> Result<UserProfile, AuthError> {
        if let Err(e) = self.sessions.set_session(&profile) {
            self.state.write().sign_out();
            return Err(e.into());
        }
        let mut state = self.state.write();
        state.profile = Some(profile.clone());
        state.session_hours = self.sessions.remaining_hours();
        Ok(profile)
    }
}

fn basic_profile(identity: &Identity, role: Role) -> UserProfile {
    let name = identity
        .display_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email_local_part(&identity.email).to_string());
    UserProfile::new(name, &identity.email, role).with_id(&identity.uid)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::auth::session::{SessionSettings, SESSION_KEY};
    use crate::auth::TimerExit;
    use crate::clock::ManualClock;
    use crate::models::UserStatus;
    use crate::remote::{MemoryIdentityProvider, MemoryProfileStore, RemoteError};
    use crate::storage::{MemoryStorage, SessionStorage};

    struct Harness {
        auth: AuthService,
        identity: Arc<MemoryIdentityProvider>,
        profiles: Arc<MemoryProfileStore>,
        storage: Arc<MemoryStorage>,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let profiles = Arc::new(MemoryProfileStore::new());
        let storage = Arc::new(MemoryStorage::new());
        let clock = ManualClock::at_millis(1_700_000_000_000);
        let sessions = Arc::new(SessionManager::new(
            storage.clone(),
            Arc::new(clock.clone()),
            SessionSettings::default(),
        ));
        let auth = AuthService::new(identity.clone(), profiles.clone(), sessions);
        Harness {
            auth,
            identity,
            profiles,
            storage,
            clock,
        }
    }

    /// Same storage, fresh service: a page reload
    fn reload(h: &Harness) -> AuthService {
        let sessions = Arc::new(SessionManager::new(
            h.storage.clone(),
            Arc::new(h.clock.clone()),
            SessionSettings::default(),
        ));
        AuthService::new(h.identity.clone(), h.profiles.clone(), sessions)
    }

    #[tokio::test]
    async fn test_sign_up_creates_profile_and_session() {
        let h = harness();
        let profile = h
            .auth
            .sign_up("sara@example.com", "secret1", "سارا", None)
            .await
            .unwrap();

        assert_eq!(profile.role, Role::User);
        assert_eq!(profile.status, UserStatus::Active);
        assert_eq!(h.auth.state().session_hours, 24);
        assert!(h.auth.is_authenticated());

        let stored = h.profiles.get_by_email("sara@example.com").await.unwrap();
        assert_eq!(stored.map(|p| p.name), Some("سارا".to_string()));
        assert_eq!(h.auth.sessions().get_session(), Some(profile));
    }

    #[tokio::test]
    async fn test_sign_in_hydrates_stored_profile() {
        let h = harness();
        let account = h.identity.register("mod@example.com", "123456", None);
        h.profiles
            .create(UserProfile::new("ناظر", "mod@example.com", Role::Moderator).with_id(&account.uid))
            .await
            .unwrap();

        let profile = h.auth.sign_in("mod@example.com", "123456").await.unwrap();
        assert_eq!(profile.role, Role::Moderator);
        assert!(h.auth.has_role(Role::Moderator));
        assert!(!h.auth.has_role(Role::Admin));
    }

    #[tokio::test]
    async fn test_sign_in_without_profile_builds_basic_one() {
        let h = harness();
        h.identity.register("reza@example.com", "123456", None);

        let profile = h.auth.sign_in("reza@example.com", "123456").await.unwrap();
        assert_eq!(profile.name, "reza");
        assert_eq!(profile.role, Role::User);
        assert!(h.auth.sessions().is_session_valid());
    }

    #[tokio::test]
    async fn test_sign_in_bad_password_leaves_no_session() {
        let h = harness();
        h.identity.register("reza@example.com", "123456", None);

        let err = h.auth.sign_in("reza@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::Remote(RemoteError::InvalidCredentials)));
        assert!(!h.auth.is_authenticated());
        assert!(!h.storage.contains(SESSION_KEY));
    }

    #[tokio::test]
    async fn test_sign_in_with_storage_failure_stays_signed_out() {
        let h = harness();
        h.identity.register("reza@example.com", "123456", None);
        h.storage.set_reject_writes(true);

        let err = h.auth.sign_in("reza@example.com", "123456").await.unwrap_err();
        assert!(matches!(err, AuthError::Session(_)));
        assert!(!h.auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_prefers_cached_session() {
        let h = harness();
        h.auth
            .sign_up("sara@example.com", "secret1", "Sara", Some(Role::Admin))
            .await
            .unwrap();
        h.clock.advance(Duration::hours(5));
        // The provider forgetting the user does not matter while the cache is live
        h.identity.sign_out().await.unwrap();

        let reloaded = reload(&h);
        let profile = reloaded.restore().await.unwrap().unwrap();
        assert_eq!(profile.email, "sara@example.com");
        assert_eq!(reloaded.state().session_hours, 19);
        assert!(reloaded.has_role(Role::Admin));
    }

    #[tokio::test]
    async fn test_restore_falls_back_to_provider_identity() {
        let h = harness();
        h.identity.register("first@example.com", "123456", Some("First"));
        h.identity.sign_in("first@example.com", "123456").await.unwrap();

        let profile = h.auth.restore().await.unwrap().unwrap();
        assert_eq!(profile.name, "First");
        assert_eq!(profile.role, Role::Admin);
        assert!(h.profiles.get_by_email("first@example.com").await.unwrap().is_some());
        assert!(h.auth.sessions().is_session_valid());
    }

    #[tokio::test]
    async fn test_restore_without_anything_is_signed_out() {
        let h = harness();
        h.storage.set(SESSION_KEY, "garbage").unwrap();

        assert!(h.auth.restore().await.unwrap().is_none());
        assert!(!h.auth.is_authenticated());
        assert!(!h.storage.contains(SESSION_KEY));
    }

    #[tokio::test]
    async fn test_restore_after_expiry_uses_provider() {
        let h = harness();
        h.auth
            .sign_up("sara@example.com", "secret1", "Sara", None)
            .await
            .unwrap();
        h.identity.sign_out().await.unwrap();
        h.clock.advance(Duration::hours(25));

        let reloaded = reload(&h);
        assert!(reloaded.restore().await.unwrap().is_none());
        assert!(!h.storage.contains(SESSION_KEY));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_remote_fails() {
        let h = harness();
        h.auth
            .sign_up("sara@example.com", "secret1", "Sara", None)
            .await
            .unwrap();
        h.identity.set_offline(true);

        assert!(matches!(
            h.auth.logout().await,
            Err(AuthError::Remote(RemoteError::Unavailable(_)))
        ));
        assert_eq!(h.auth.state(), AuthState::default());
        assert!(!h.storage.contains(SESSION_KEY));
    }

    #[tokio::test]
    async fn test_update_profile_recaches_with_fresh_deadline() {
        let h = harness();
        h.auth
            .sign_up("sara@example.com", "secret1", "Sara", None)
            .await
            .unwrap();
        h.clock.advance(Duration::hours(3));

        let update = ProfileUpdate {
            name: Some("سارا احمدی".to_string()),
            ..ProfileUpdate::default()
        };
        let updated = h.auth.update_profile(&update).await.unwrap();
        assert_eq!(updated.name, "سارا احمدی");
        assert_eq!(h.auth.state().session_hours, 24);
        assert_eq!(
            h.auth.sessions().get_session().map(|p| p.name),
            Some("سارا احمدی".to_string())
        );
    }

    #[tokio::test]
    async fn test_update_profile_requires_sign_in() {
        let h = harness();
        let err = h
            .auth
            .update_profile(&ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_extend_and_refresh_session_time() {
        let h = harness();
        assert_eq!(
            h.auth.extend_session().unwrap(),
            ExtendOutcome::NoSession
        );

        h.auth
            .sign_up("sara@example.com", "secret1", "Sara", None)
            .await
            .unwrap();
        h.clock.advance(Duration::hours(10));
        assert_eq!(h.auth.refresh_session_time(), 14);

        assert!(h.auth.extend_session().unwrap().extended());
        assert_eq!(h.auth.state().session_hours, 24);

        h.clock.advance(Duration::hours(24));
        assert_eq!(h.auth.refresh_session_time(), 0);
        assert!(!h.auth.is_authenticated());
    }

    #[tokio::test]
    async fn test_refresh_keeps_user_in_final_hour() {
        let h = harness();
        h.auth
            .sign_up("sara@example.com", "secret1", "Sara", None)
            .await
            .unwrap();
        h.clock.advance(Duration::minutes(23 * 60 + 30));

        assert_eq!(h.auth.refresh_session_time(), 0);
        assert!(h.auth.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_watch_signs_out() {
        let h = harness();
        h.auth
            .sign_up("sara@example.com", "secret1", "Sara", None)
            .await
            .unwrap();
        let timer = h.auth.start_expiry_watch().unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert!(h.auth.is_authenticated());

        h.clock.advance(Duration::hours(24));
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(timer.wait().await, TimerExit::Expired);
        assert!(!h.auth.is_authenticated());
    }
}
