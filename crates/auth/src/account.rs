//! Account record as seen by the authorization boundary.

use cad_core::{AccountId, DomainError, DomainResult};
use serde::{Deserialize, Serialize};

/// Capability flags gating route access.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFlags {
    pub verified: bool,
    pub leo: bool,
    pub ems: bool,
    pub admin: bool,
}

/// An account resolved from the [`crate::AccountGateway`].
///
/// Credentials never leave the gateway; this is the part of the record the
/// pipeline and handlers are allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub flags: AccountFlags,
}

impl Account {
    /// A newly registered account: every capability flag starts cleared.
    pub fn new(id: AccountId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            flags: AccountFlags::default(),
        }
    }
}

/// Typed partial update of [`AccountFlags`].
///
/// `admin` is absent: it cannot be granted through a patch.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlagsPatch {
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub leo: Option<bool>,
    #[serde(default)]
    pub ems: Option<bool>,
}

impl FlagsPatch {
    pub fn is_empty(&self) -> bool {
        self.verified.is_none() && self.leo.is_none() && self.ems.is_none()
    }

    /// Apply the patch to `current`, returning the updated flags.
    ///
    /// Fails on the first field whose requested value equals its current one,
    /// checked in `verified`, `leo`, `ems` order.
    pub fn apply(&self, current: AccountFlags) -> DomainResult<AccountFlags> {
        let mut next = current;

        let fields = [
            ("verified", self.verified, &mut next.verified),
            ("leo", self.leo, &mut next.leo),
            ("ems", self.ems, &mut next.ems),
        ];

        for (name, requested, slot) in fields {
            if let Some(value) = requested {
                if value == *slot {
                    return Err(DomainError::unchanged(name));
                }
                *slot = value;
            }
        }

        Ok(next)
    }
}

/// Self-service change to an account's email and/or password.
///
/// The password is only ever compared and stored by the
/// [`crate::AccountGateway`]; `apply` is told whether it matches.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountPatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl core::fmt::Debug for AccountPatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountPatch")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }

    /// Number of fields the patch touches.
    pub fn change_count(&self) -> usize {
        usize::from(self.email.is_some()) + usize::from(self.password.is_some())
    }

    /// Validate the patch and return `current` with the new email applied.
    ///
    /// `password_is_current` is the gateway's answer to whether the requested
    /// password equals the stored one. Unchanged checks run in `email`,
    /// `password` order, after validation.
    pub fn apply(&self, current: &Account, password_is_current: bool) -> DomainResult<Account> {
        let email = match &self.email {
            Some(raw) => {
                let email = raw.trim();
                if email.is_empty() || !email.contains('@') {
                    return Err(DomainError::validation("email must be a valid address"));
                }
                Some(email)
            }
            None => None,
        };

        if self.password.as_deref().is_some_and(str::is_empty) {
            return Err(DomainError::validation("password must not be empty"));
        }

        if email.is_some_and(|email| email == current.email) {
            return Err(DomainError::unchanged("email"));
        }

        if self.password.is_some() && password_is_current {
            return Err(DomainError::unchanged("password"));
        }

        let mut next = current.clone();
        if let Some(email) = email {
            next.email = email.to_string();
        }
        Ok(next)
    }
}
