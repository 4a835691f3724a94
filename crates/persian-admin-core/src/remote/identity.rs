use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::RemoteError;

/// Minimum password length accepted at sign-up
const MIN_PASSWORD_LENGTH: usize = 6;

/// Length of generated account ids
const UID_LENGTH: usize = 28;

/// An account as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, RemoteError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, RemoteError>;

    async fn sign_out(&self) -> Result<(), RemoteError>;

    /// The provider's own signed-in account, if any
    async fn current_identity(&self) -> Option<Identity>;
}

struct Account {
    identity: Identity,
    password: String,
}

/// Accounts kept in process memory
#[derive(Default)]
pub struct MemoryIdentityProvider {
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Identity>>,
    offline: RwLock<bool>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account without signing in
    pub fn register(&self, email: &str, password: &str, display_name: Option<&str>) -> Identity {
        insert_account(&mut self.accounts.write(), email, password, display_name)
    }

    /// Make every call fail as if the provider were unreachable
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    fn check_online(&self) -> Result<(), RemoteError> {
        if *self.offline.read() {
            return Err(RemoteError::Unavailable("identity provider offline".to_string()));
        }
        Ok(())
    }

    fn do_sign_in(&self, email: &str, password: &str) -> Result<Identity, RemoteError> {
        self.check_online()?;
        let identity = match self.accounts.read().get(&normalize(email)) {
            Some(account) if account.password == password => account.identity.clone(),
            _ => return Err(RemoteError::InvalidCredentials),
        };
        debug!(uid = %identity.uid, "Identity signed in");
        *self.current.write() = Some(identity.clone());
        Ok(identity)
    }

    fn do_sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, RemoteError> {
        self.check_online()?;
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(RemoteError::WeakPassword(MIN_PASSWORD_LENGTH));
        }
        let identity = {
            let mut accounts = self.accounts.write();
            if accounts.contains_key(&normalize(email)) {
                return Err(RemoteError::EmailInUse(email.to_string()));
            }
            insert_account(&mut accounts, email, password, Some(display_name))
        };
        *self.current.write() = Some(identity.clone());
        Ok(identity)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, RemoteError> {
        self.do_sign_in(email, password)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity, RemoteError> {
        self.do_sign_up(email, password, display_name)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.check_online()?;
        *self.current.write() = None;
        Ok(())
    }

    async fn current_identity(&self) -> Option<Identity> {
        self.current.read().clone()
    }
}

fn insert_account(
    accounts: &mut HashMap<String, Account>,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Identity {
    let identity = Identity {
        uid: generate_uid(),
        email: email.to_string(),
        display_name: display_name.map(str::to_string),
    };
    accounts.insert(
        normalize(email),
        Account {
            identity: identity.clone(),
            password: password.to_string(),
        },
    );
    identity
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

fn generate_uid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(UID_LENGTH)
        .map(char::from)
        .collect()
}
