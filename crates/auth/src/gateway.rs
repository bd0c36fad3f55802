//! Account store abstraction consumed by the authorization chain.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use cad_core::AccountId;
use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::account::Account;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The backing store could not answer. Never an authorization outcome.
    #[error("account store unavailable: {0}")]
    Unavailable(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("account not found")]
    NotFound,
}

/// Account persistence owned by the surrounding service.
///
/// Implementations own credential storage; password material is accepted
/// here and never exposed on [`Account`].
#[async_trait]
pub trait AccountGateway: Send + Sync {
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, GatewayError>;

    /// Resolve the account matching both email and password.
    async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Account>, GatewayError>;

    async fn list(&self) -> Result<Vec<Account>, GatewayError>;

    async fn create(&self, email: &str, password: &str) -> Result<Account, GatewayError>;

    /// Persist flag/email changes to an existing account.
    async fn save(&self, account: &Account) -> Result<(), GatewayError>;

    /// Whether `password` is the one currently stored for `id`.
    async fn verify_password(&self, id: &AccountId, password: &str) -> Result<bool, GatewayError>;

    async fn set_password(&self, id: &AccountId, password: &str) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password_digest: Vec<u8>,
}

/// In-memory account store for tests/dev.
///
/// Passwords are kept as SHA-512 digests and compared in constant time.
/// Not a production credential store.
#[derive(Debug, Default)]
pub struct InMemoryAccountGateway {
    inner: RwLock<HashMap<AccountId, StoredAccount>>,
}

impl InMemoryAccountGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed account (used for seeding and tests).
    pub fn insert(&self, account: Account, password: &str) -> Result<(), GatewayError> {
        let mut map = self.write()?;
        if map.values().any(|s| s.account.email == account.email) {
            return Err(GatewayError::EmailTaken);
        }
        map.insert(
            account.id,
            StoredAccount {
                account,
                password_digest: digest(password),
            },
        );
        Ok(())
    }

    /// Drop an account; tokens already issued for it become orphaned.
    pub fn remove(&self, id: &AccountId) -> Result<Option<Account>, GatewayError> {
        Ok(self.write()?.remove(id).map(|s| s.account))
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<AccountId, StoredAccount>>, GatewayError>
    {
        self.inner
            .read()
            .map_err(|_| GatewayError::Unavailable("account map lock poisoned".into()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<AccountId, StoredAccount>>, GatewayError>
    {
        self.inner
            .write()
            .map_err(|_| GatewayError::Unavailable("account map lock poisoned".into()))
    }
}

fn digest(password: &str) -> Vec<u8> {
    Sha512::digest(password.as_bytes()).to_vec()
}

#[async_trait]
impl AccountGateway for InMemoryAccountGateway {
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, GatewayError> {
        Ok(self.read()?.get(id).map(|s| s.account.clone()))
    }

    async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Account>, GatewayError> {
        let candidate = digest(password);
        let map = self.read()?;

        Ok(map
            .values()
            .find(|s| s.account.email == email)
            .filter(|s| bool::from(s.password_digest.ct_eq(&candidate)))
            .map(|s| s.account.clone()))
    }

    async fn list(&self) -> Result<Vec<Account>, GatewayError> {
        let mut accounts: Vec<Account> = self.read()?.values().map(|s| s.account.clone()).collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn create(&self, email: &str, password: &str) -> Result<Account, GatewayError> {
        let account = Account::new(AccountId::new(), email);
        self.insert(account.clone(), password)?;
        Ok(account)
    }

    async fn save(&self, account: &Account) -> Result<(), GatewayError> {
        let mut map = self.write()?;
        if map
            .values()
            .any(|s| s.account.id != account.id && s.account.email == account.email)
        {
            return Err(GatewayError::EmailTaken);
        }

        let stored = map.get_mut(&account.id).ok_or(GatewayError::NotFound)?;
        stored.account = account.clone();
        Ok(())
    }

    async fn verify_password(&self, id: &AccountId, password: &str) -> Result<bool, GatewayError> {
        let candidate = digest(password);
        let map = self.read()?;
        let stored = map.get(id).ok_or(GatewayError::NotFound)?;
        Ok(bool::from(stored.password_digest.ct_eq(&candidate)))
    }

    async fn set_password(&self, id: &AccountId, password: &str) -> Result<(), GatewayError> {
        let mut map = self.write()?;
        let stored = map.get_mut(id).ok_or(GatewayError::NotFound)?;
        stored.password_digest = digest(password);
        Ok(())
    }
}
