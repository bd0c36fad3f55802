//! `cad-auth`: session tokens and layered authorization (zero-trust boundary).
//!
//! This crate knows nothing about HTTP. Storage is reached only
//! through the [`AccountGateway`] trait.

pub mod account;
pub mod chain;
pub mod codec;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod session;

pub use account::{Account, AccountFlags, AccountPatch, FlagsPatch};
pub use chain::{
    AccessPolicy, AuthorizationChain, AuthorizationContext, Authorized, Denied, LeoPolicy, RoleGate,
};
pub use codec::{CodecError, DecodeOutcome, TokenCodec};
pub use error::{AuthError, ForbiddenReason, Rejection};
pub use gateway::{AccountGateway, GatewayError, InMemoryAccountGateway};
pub use lifecycle::{ExpirationStatus, GRACE_WINDOW, classify};
pub use session::{ACCESS_TTL, EncodeResult, PartialSession, Session};
