//! Failure taxonomy of the authorization chain.

use thiserror::Error;

use crate::codec::CodecError;
use crate::gateway::GatewayError;

/// Which gate turned the request away.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ForbiddenReason {
    NotVerified,
    NotAdmin,
    NotLeo,
}

/// Client-facing rejection: the caller is not authorized.
///
/// Each variant terminates the chain at the stage that produced it and is
/// never retried. `InvalidToken` and `IntegrityError` render the same
/// message so a client cannot tell which check failed.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Missing 'Authorization' header")]
    MissingHeader,

    #[error("Session token must be a Bearer token")]
    MalformedScheme,

    #[error("Invalid session token")]
    InvalidToken,

    #[error("Invalid session token")]
    IntegrityError,

    #[error("Expired session token")]
    Expired,

    #[error("Associated account not found")]
    AccountNotFound,

    #[error("{}", forbidden_message(.0))]
    Forbidden(ForbiddenReason),
}

fn forbidden_message(reason: &ForbiddenReason) -> &'static str {
    match reason {
        ForbiddenReason::NotVerified => "Account not verified",
        ForbiddenReason::NotAdmin | ForbiddenReason::NotLeo => "Invalid authorization",
    }
}

impl Rejection {
    /// Gate failures (as opposed to authentication failures).
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// Everything the chain can fail with.
///
/// `Rejected` means "you are not authorized"; the other arms mean "the
/// system could not decide" and must surface as internal errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl AuthError {
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected(r) => Some(*r),
            Self::Codec(_) | Self::Gateway(_) => None,
        }
    }
}
