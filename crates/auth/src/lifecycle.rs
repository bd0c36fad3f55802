//! Temporal validity of a decoded session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::{Session, millis};

/// How long past `expires` a session is still accepted and silently replaced.
pub const GRACE_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Where a session sits in its lifetime.
///
/// Transitions are driven by time only: `Active → Grace → Expired`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationStatus {
    Active,
    Grace,
    Expired,
}

/// Classify `session` at instant `now`.
///
/// Windows are half-open (`[issued, expires)`, `[expires, expires + GRACE_WINDOW)`)
/// so every instant maps to exactly one status.
pub fn classify(session: &Session, now: DateTime<Utc>) -> ExpirationStatus {
    if now < session.expires {
        ExpirationStatus::Active
    } else if now < session.expires + millis(GRACE_WINDOW) {
        ExpirationStatus::Grace
    } else {
        ExpirationStatus::Expired
    }
}
