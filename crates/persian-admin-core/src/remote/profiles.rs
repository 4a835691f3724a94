use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info};

use super::{IdentityProvider, RemoteError};
use crate::models::{ProfileUpdate, Role, UserProfile};

/// Length of generated document ids
const DOCUMENT_ID_LENGTH: usize = 20;

/// Password of the seeded demo administrator
pub const DEMO_PASSWORD: &str = "123456";

/// The `users` document collection
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<UserProfile>, RemoteError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, RemoteError>;

    /// Insert a profile. Uses `profile.id` as the document id when set,
    /// otherwise generates one. Fails if the email is already taken.
    async fn create(&self, profile: UserProfile) -> Result<UserProfile, RemoteError>;

    /// Merge `update` into the stored document
    async fn update(&self, id: &str, update: &ProfileUpdate) -> Result<UserProfile, RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;

    async fn list(&self) -> Result<Vec<UserProfile>, RemoteError>;
}

/// Profiles kept in process memory, keyed by document id
#[derive(Default)]
pub struct MemoryProfileStore {
    documents: RwLock<BTreeMap<String, UserProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_by_email(&self, email: &str) -> Option<UserProfile> {
        find_in(&self.documents.read(), email).cloned()
    }

    fn insert(&self, mut profile: UserProfile) -> Result<UserProfile, RemoteError> {
        let mut documents = self.documents.write();
        if find_in(&documents, &profile.email).is_some() {
            return Err(RemoteError::EmailInUse(profile.email));
        }
        let id = profile.id.clone().unwrap_or_else(generate_document_id);
        let now = Utc::now();
        profile.id = Some(id.clone());
        profile.created_at = Some(now);
        profile.updated_at = Some(now);
        documents.insert(id.clone(), profile.clone());
        debug!(id = %id, "Created profile document");
        Ok(profile)
    }

    fn apply_update(&self, id: &str, update: &ProfileUpdate) -> Result<UserProfile, RemoteError> {
        let mut documents = self.documents.write();
        let profile = documents
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        profile.merge(update);
        profile.updated_at = Some(Utc::now());
        Ok(profile.clone())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<UserProfile>, RemoteError> {
        Ok(self.documents.read().get(id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, RemoteError> {
        Ok(self.find_by_email(email))
    }

    async fn create(&self, profile: UserProfile) -> Result<UserProfile, RemoteError> {
        self.insert(profile)
    }

    async fn update(&self, id: &str, update: &ProfileUpdate) -> Result<UserProfile, RemoteError> {
        self.apply_update(id, update)
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        match self.documents.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(id.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<UserProfile>, RemoteError> {
        Ok(self.documents.read().values().cloned().collect())
    }
}

/// Create the demo administrator when the users collection is empty.
///
/// Failures are logged and otherwise ignored.
pub async fn seed_demo_users(identity: &dyn IdentityProvider, profiles: &dyn ProfileStore) {
    match profiles.list().await {
        Ok(existing) if !existing.is_empty() => return,
        Ok(_) => {}
        Err(e) => {
            debug!(error = %e, "Skipping demo users");
            return;
        }
    }

    let admin = UserProfile::new("مدیر سیستم", "admin@example.com", Role::Admin);
    let account = match identity.sign_up(&admin.email, DEMO_PASSWORD, &admin.name).await {
        Ok(account) => account,
        Err(e) => {
            debug!(error = %e, "Failed to register demo administrator");
            return;
        }
    };
    // Registration signs the account in; the demo seed should not
    let _ = identity.sign_out().await;

    match profiles.create(admin.with_id(account.uid)).await {
        Ok(profile) => info!(email = %profile.email, "Seeded demo administrator"),
        Err(e) => debug!(error = %e, "Failed to create demo administrator profile"),
    }
}

fn find_in<'a>(
    documents: &'a BTreeMap<String, UserProfile>,
    email: &str,
) -> Option<&'a UserProfile> {
    let email = email.trim().to_lowercase();
    documents.values().find(|p| p.email.to_lowercase() == email)
}

fn generate_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_ID_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserStatus;
    use crate::remote::MemoryIdentityProvider;

    #[tokio::test]
    async fn test_create_assigns_id_and_timestamps() {
        let store = MemoryProfileStore::new();
        let created = store
            .create(UserProfile::new("Sara", "sara@example.com", Role::User))
            .await
            .unwrap();

        let id = created.id.clone().unwrap();
        assert_eq!(id.len(), DOCUMENT_ID_LENGTH);
        assert!(created.created_at.is_some());
        assert_eq!(store.get_by_id(&id).await.unwrap(), Some(created.clone()));
        assert_eq!(store.get_by_email("SARA@example.com").await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let store = MemoryProfileStore::new();
        store
            .create(UserProfile::new("Sara", "sara@example.com", Role::User))
            .await
            .unwrap();
        let err = store
            .create(UserProfile::new("Other", "sara@example.com", Role::Admin))
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::EmailInUse("sara@example.com".to_string()));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_creates_keep_email_unique() {
        use std::sync::Barrier;

        let store = MemoryProfileStore::new();
        let barrier = Barrier::new(8);

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = &store;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        let profile = UserProfile::new("Sara", "sara@example.com", Role::User)
                            .with_id(format!("u{}", i));
                        barrier.wait();
                        store.insert(profile)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });

        assert_eq!(successes, 1);
        assert_eq!(store.documents.read().len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryProfileStore::new();
        store
            .create(UserProfile::new("Sara", "sara@example.com", Role::User).with_id("u1"))
            .await
            .unwrap();

        let update = ProfileUpdate {
            status: Some(UserStatus::Inactive),
            ..ProfileUpdate::default()
        };
        let updated = store.update("u1", &update).await.unwrap();
        assert_eq!(updated.status, UserStatus::Inactive);
        assert_eq!(updated.name, "Sara");

        assert_eq!(
            store.update("missing", &update).await,
            Err(RemoteError::NotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryProfileStore::new();
        store
            .create(UserProfile::new("Sara", "sara@example.com", Role::User).with_id("u1"))
            .await
            .unwrap();
        store.delete("u1").await.unwrap();
        assert!(store.get_by_id("u1").await.unwrap().is_none());
        assert!(store.delete("u1").await.is_err());
    }

    #[tokio::test]
    async fn test_seed_demo_users_only_when_empty() {
        let identity = MemoryIdentityProvider::new();
        let store = MemoryProfileStore::new();

        seed_demo_users(&identity, &store).await;
        seed_demo_users(&identity, &store).await;

        let users = store.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].role, Role::Admin);
        assert!(identity.current_identity().await.is_none());

        let account = identity.sign_in("admin@example.com", DEMO_PASSWORD).await.unwrap();
        assert_eq!(users[0].id.as_deref(), Some(account.uid.as_str()));
    }
}
