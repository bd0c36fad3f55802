use serde::{Deserialize, Serialize};

use cad_auth::{Account, AccountFlags};
use cad_core::AccountId;

// -------------------------
// Request DTOs
// -------------------------

/// Body of account creation and login.
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct CreatedAccount {
    pub id: AccountId,
}

/// Public view of an account (no credential material).
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub flags: AccountFlags,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            flags: account.flags,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultMessage {
    pub result: String,
}

impl ResultMessage {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}
