//! Session claim set carried inside tokens.

use std::time::Duration;

use cad_core::AccountId;
use chrono::serde::ts_milliseconds;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Nominal lifetime of a freshly minted session.
pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Identity claim before timing fields are attached.
///
/// Produced by login/account creation and by the grace refresh path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSession {
    pub id: AccountId,
}

impl PartialSession {
    pub fn new(id: AccountId) -> Self {
        Self { id }
    }
}

/// Decoded (or freshly minted) session.
///
/// `expires == issued + ACCESS_TTL` holds for every session this crate
/// produces; the fields are only ever set by `TokenCodec::encode_at`.
/// Timestamps travel as integer milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: AccountId,
    #[serde(with = "ts_milliseconds")]
    pub issued: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub expires: DateTime<Utc>,
}

impl Session {
    /// The identity claim, stripped of timing fields.
    pub fn partial(&self) -> PartialSession {
        PartialSession { id: self.id }
    }
}

/// Result of minting a session: the signed token plus its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeResult {
    pub token: String,
    #[serde(with = "ts_milliseconds")]
    pub issued: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub expires: DateTime<Utc>,
}

impl EncodeResult {
    /// The session this token carries.
    pub fn session(&self, id: AccountId) -> Session {
        Session {
            id,
            issued: self.issued,
            expires: self.expires,
        }
    }
}

/// Millisecond-resolution conversion used for all window arithmetic.
pub(crate) fn millis(d: Duration) -> TimeDelta {
    TimeDelta::milliseconds(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
