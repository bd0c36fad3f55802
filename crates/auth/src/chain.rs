//! Per-request authorization pipeline.
//!
//! Stages run in a fixed order and the first failure ends the request:
//!
//! 1. bearer header extraction
//! 2. token decode
//! 3. lifecycle classification (with grace refresh)
//! 4. account resolution
//! 5. verification gate (if the policy asks for it)
//! 6. role gates (if the policy asks for them)
//!
//! The chain never touches a response object. A grace refresh is returned
//! in [`Authorized::refreshed`] and the boundary decides how to ship it.

use core::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::account::{Account, AccountFlags};
use crate::codec::{DecodeOutcome, TokenCodec};
use crate::error::{AuthError, ForbiddenReason, Rejection};
use crate::gateway::AccountGateway;
use crate::lifecycle::{ExpirationStatus, classify};
use crate::session::{EncodeResult, Session};

const BEARER_PREFIX: &str = "Bearer ";

/// How the law-enforcement gate combines the `leo` and `admin` flags.
///
/// The default admits only accounts carrying *both* flags. Deployments that
/// want either flag to suffice set `leo_or_admin`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeoPolicy {
    #[default]
    LeoAndAdmin,
    LeoOrAdmin,
}

impl LeoPolicy {
    pub fn permits(&self, flags: &AccountFlags) -> bool {
        match self {
            Self::LeoAndAdmin => flags.leo && flags.admin,
            Self::LeoOrAdmin => flags.leo || flags.admin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeoAndAdmin => "leo_and_admin",
            Self::LeoOrAdmin => "leo_or_admin",
        }
    }
}

impl FromStr for LeoPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leo_and_admin" => Ok(Self::LeoAndAdmin),
            "leo_or_admin" => Ok(Self::LeoOrAdmin),
            other => Err(format!(
                "unknown LEO policy '{other}' (expected leo_and_admin or leo_or_admin)"
            )),
        }
    }
}

/// Route-specific role requirement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RoleGate {
    Admin,
    Leo,
}

/// What a route demands beyond a valid session and an existing account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    require_verified: bool,
    roles: Vec<RoleGate>,
}

impl AccessPolicy {
    /// Any authenticated account.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn verified(mut self) -> Self {
        self.require_verified = true;
        self
    }

    pub fn role(mut self, gate: RoleGate) -> Self {
        if !self.roles.contains(&gate) {
            self.roles.push(gate);
        }
        self
    }

    pub fn admin(self) -> Self {
        self.role(RoleGate::Admin)
    }

    pub fn leo(self) -> Self {
        self.role(RoleGate::Leo)
    }

    pub fn requires_verified(&self) -> bool {
        self.require_verified
    }

    pub fn roles(&self) -> &[RoleGate] {
        &self.roles
    }
}

/// Resolved identity for one request.
///
/// Handlers read it from the request context; it is dropped with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationContext {
    pub session: Session,
    pub account: Account,
}

impl AuthorizationContext {
    pub fn flags(&self) -> &AccountFlags {
        &self.account.flags
    }
}

/// Successful pass through the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub context: AuthorizationContext,
    /// Replacement token minted because the presented one was in its grace
    /// window. The client should switch to it.
    pub refreshed: Option<EncodeResult>,
}

/// Failed pass through the chain.
///
/// `refreshed` is set when the presented token was in its grace window and a
/// replacement was minted before a later stage rejected the request.
#[derive(Debug)]
pub struct Denied {
    pub error: AuthError,
    pub refreshed: Option<EncodeResult>,
}

impl From<AuthError> for Denied {
    fn from(error: AuthError) -> Self {
        Self {
            error,
            refreshed: None,
        }
    }
}

/// The authorization pipeline, shared by every request.
pub struct AuthorizationChain {
    codec: TokenCodec,
    accounts: Arc<dyn AccountGateway>,
    leo_policy: LeoPolicy,
}

impl core::fmt::Debug for AuthorizationChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorizationChain")
            .field("codec", &self.codec)
            .field("leo_policy", &self.leo_policy)
            .finish_non_exhaustive()
    }
}

impl AuthorizationChain {
    pub fn new(codec: TokenCodec, accounts: Arc<dyn AccountGateway>) -> Self {
        Self {
            codec,
            accounts,
            leo_policy: LeoPolicy::default(),
        }
    }

    pub fn with_leo_policy(mut self, policy: LeoPolicy) -> Self {
        self.leo_policy = policy;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn accounts(&self) -> &Arc<dyn AccountGateway> {
        &self.accounts
    }

    pub fn leo_policy(&self) -> LeoPolicy {
        self.leo_policy
    }

    /// Run the full chain for one request.
    ///
    /// A token refreshed in stage 3 survives a rejection in stages 4 to 6 and
    /// travels with the [`Denied`] value.
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        policy: &AccessPolicy,
        now: DateTime<Utc>,
    ) -> Result<Authorized, Denied> {
        let (session, refreshed) = self.open_session(authorization, now)?;

        let account = match self.resolve_account(&session).await {
            Ok(account) => account,
            Err(error) => return Err(Denied { error, refreshed }),
        };

        let context = AuthorizationContext { session, account };
        if let Err(rejection) = self.check(&context, policy) {
            return Err(Denied {
                error: rejection.into(),
                refreshed,
            });
        }

        Ok(Authorized { context, refreshed })
    }

    /// Stages 1–4: header, decode, lifecycle, account resolution.
    pub async fn authenticate(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Authorized, AuthError> {
        let (session, refreshed) = self.open_session(authorization, now)?;
        let account = self.resolve_account(&session).await?;

        Ok(Authorized {
            context: AuthorizationContext { session, account },
            refreshed,
        })
    }

    /// Stages 5–6: verification then role gates, in that order.
    pub fn check(
        &self,
        context: &AuthorizationContext,
        policy: &AccessPolicy,
    ) -> Result<(), Rejection> {
        let flags = context.flags();

        if policy.requires_verified() && !flags.verified {
            return Err(Rejection::Forbidden(ForbiddenReason::NotVerified));
        }

        for gate in policy.roles() {
            let permitted = match gate {
                RoleGate::Admin => flags.admin,
                RoleGate::Leo => self.leo_policy.permits(flags),
            };
            if !permitted {
                tracing::debug!(
                    account_id = %context.account.id,
                    gate = ?gate,
                    leo_policy = self.leo_policy.as_str(),
                    "role gate denied request"
                );
                return Err(Rejection::Forbidden(match gate {
                    RoleGate::Admin => ForbiddenReason::NotAdmin,
                    RoleGate::Leo => ForbiddenReason::NotLeo,
                }));
            }
        }

        Ok(())
    }

    /// Stage 4: the session must still point at a stored account.
    async fn resolve_account(&self, session: &Session) -> Result<Account, AuthError> {
        self.accounts.find_by_id(&session.id).await?.ok_or_else(|| {
            tracing::warn!(account_id = %session.id, "session token references a missing account");
            Rejection::AccountNotFound.into()
        })
    }

    /// Stages 1–3: extract and decode the token, then apply the lifecycle,
    /// refreshing inside the grace window.
    fn open_session(
        &self,
        authorization: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(Session, Option<EncodeResult>), AuthError> {
        let token = extract_bearer(authorization)?;
        let session = match self.codec.decode(token)? {
            DecodeOutcome::Valid(session) => session,
            DecodeOutcome::InvalidToken => {
                tracing::debug!("rejecting structurally invalid token");
                return Err(Rejection::InvalidToken.into());
            }
            DecodeOutcome::IntegrityError => {
                tracing::debug!("rejecting token that failed signature verification");
                return Err(Rejection::IntegrityError.into());
            }
        };

        match classify(&session, now) {
            ExpirationStatus::Active => Ok((session, None)),
            ExpirationStatus::Expired => Err(Rejection::Expired.into()),
            ExpirationStatus::Grace => {
                let minted = self.codec.encode_at(session.partial(), now)?;
                tracing::info!(
                    account_id = %session.id,
                    expired_at = %session.expires,
                    new_expires = %minted.expires,
                    "refreshed session inside grace window"
                );
                Ok((minted.session(session.id), Some(minted)))
            }
        }
    }
}

/// Stage 1: pull the token out of an `Authorization` header value.
///
/// The scheme match is case-sensitive; everything after `"Bearer "` is the
/// candidate token, even if empty.
pub fn extract_bearer(authorization: Option<&str>) -> Result<&str, Rejection> {
    let header = authorization.ok_or(Rejection::MissingHeader)?;
    header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(Rejection::MalformedScheme)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use cad_core::AccountId;
    use chrono::TimeDelta;

    use super::*;
    use crate::gateway::{GatewayError, InMemoryAccountGateway};
    use crate::session::PartialSession;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    struct Fixture {
        chain: AuthorizationChain,
        gateway: Arc<InMemoryAccountGateway>,
    }

    fn fixture() -> Fixture {
        let gateway = Arc::new(InMemoryAccountGateway::new());
        let chain = AuthorizationChain::new(TokenCodec::new("s"), gateway.clone());
        Fixture { chain, gateway }
    }

    fn seed(gateway: &InMemoryAccountGateway, flags: AccountFlags) -> Account {
        let mut account = Account::new(AccountId::new(), format!("{}@example.com", AccountId::new()));
        account.flags = flags;
        gateway.insert(account.clone(), "pw").unwrap();
        account
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    fn rejection(err: AuthError) -> Rejection {
        err.rejection()
            .unwrap_or_else(|| panic!("expected a rejection, got {err:?}"))
    }

    fn context_for(flags: AccountFlags) -> AuthorizationContext {
        let account = Account {
            flags,
            ..Account::new(AccountId::new(), "ctx@example.com")
        };
        AuthorizationContext {
            session: Session {
                id: account.id,
                issued: t0(),
                expires: t0() + TimeDelta::minutes(15),
            },
            account,
        }
    }

    #[test]
    fn bearer_extraction_rules() {
        assert_eq!(extract_bearer(None), Err(Rejection::MissingHeader));
        assert_eq!(extract_bearer(Some("Basic abc")), Err(Rejection::MalformedScheme));
        assert_eq!(extract_bearer(Some("bearer abc")), Err(Rejection::MalformedScheme));
        assert_eq!(extract_bearer(Some("Bearer")), Err(Rejection::MalformedScheme));
        assert_eq!(extract_bearer(Some("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(extract_bearer(Some("Bearer ")), Ok(""));
    }

    #[tokio::test]
    async fn missing_header_rejected_before_anything_else() {
        let fx = fixture();
        let err = fx
            .chain
            .authorize(None, &AccessPolicy::authenticated(), t0())
            .await
            .unwrap_err();
        assert_eq!(err.refreshed, None);
        assert_eq!(rejection(err.error), Rejection::MissingHeader);
    }

    #[tokio::test]
    async fn wrong_scheme_is_rejected() {
        let fx = fixture();
        let err = fx
            .chain
            .authenticate(Some("Token abc"), t0())
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::MalformedScheme);
    }

    #[tokio::test]
    async fn active_session_passes_through_unchanged() {
        let fx = fixture();
        let account = seed(&fx.gateway, AccountFlags::default());
        let minted = fx.chain.codec().encode_at(PartialSession::new(account.id), t0()).unwrap();

        let authorized = fx
            .chain
            .authenticate(Some(&bearer(&minted.token)), t0() + TimeDelta::minutes(5))
            .await
            .unwrap();

        assert_eq!(authorized.refreshed, None);
        assert_eq!(authorized.context.session, minted.session(account.id));
        assert_eq!(authorized.context.account, account);
    }

    #[tokio::test]
    async fn garbage_and_forged_tokens_are_rejected() {
        let fx = fixture();
        let account = seed(&fx.gateway, AccountFlags::default());

        let err = fx.chain.authenticate(Some("Bearer nope"), t0()).await.unwrap_err();
        assert_eq!(rejection(err), Rejection::InvalidToken);

        let forged = TokenCodec::new("not-the-secret")
            .encode_at(PartialSession::new(account.id), t0())
            .unwrap();
        let err = fx
            .chain
            .authenticate(Some(&bearer(&forged.token)), t0())
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::IntegrityError);
    }

    #[tokio::test]
    async fn grace_window_refreshes_and_expiry_rejects() {
        let fx = fixture();
        let account = seed(&fx.gateway, AccountFlags::default());
        let minted = fx.chain.codec().encode_at(PartialSession::new(account.id), t0()).unwrap();
        let header = bearer(&minted.token);

        let at_20m = t0() + TimeDelta::minutes(20);
        let authorized = fx.chain.authenticate(Some(&header), at_20m).await.unwrap();
        let refreshed = authorized.refreshed.expect("grace window should refresh");

        assert_eq!(refreshed.issued, at_20m);
        assert_eq!(refreshed.expires, at_20m + TimeDelta::minutes(15));
        assert!(authorized.context.session.issued > minted.issued);
        assert_eq!(authorized.context.session, refreshed.session(account.id));

        // The replacement token is itself active and carries the same identity.
        let again = fx.chain.authenticate(Some(&bearer(&refreshed.token)), at_20m).await.unwrap();
        assert_eq!(again.refreshed, None);
        assert_eq!(again.context.account.id, account.id);

        let err = fx
            .chain
            .authenticate(Some(&header), t0() + TimeDelta::minutes(90))
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::Expired);
    }

    #[tokio::test]
    async fn orphaned_token_is_account_not_found() {
        let fx = fixture();
        let account = seed(&fx.gateway, AccountFlags::default());
        let minted = fx.chain.codec().encode_at(PartialSession::new(account.id), t0()).unwrap();
        fx.gateway.remove(&account.id).unwrap();

        let err = fx
            .chain
            .authenticate(Some(&bearer(&minted.token)), t0())
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::AccountNotFound);
    }

    struct DownGateway;

    #[async_trait]
    impl AccountGateway for DownGateway {
        async fn find_by_id(&self, _id: &AccountId) -> Result<Option<Account>, GatewayError> {
            Err(GatewayError::Unavailable("connection refused".into()))
        }

        async fn find_by_credentials(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<Option<Account>, GatewayError> {
            Err(GatewayError::Unavailable("connection refused".into()))
        }

        async fn list(&self) -> Result<Vec<Account>, GatewayError> {
            Err(GatewayError::Unavailable("connection refused".into()))
        }

        async fn create(&self, _email: &str, _password: &str) -> Result<Account, GatewayError> {
            Err(GatewayError::Unavailable("connection refused".into()))
        }

        async fn save(&self, _account: &Account) -> Result<(), GatewayError> {
            Err(GatewayError::Unavailable("connection refused".into()))
        }

        async fn verify_password(
            &self,
            _id: &AccountId,
            _password: &str,
        ) -> Result<bool, GatewayError> {
            Err(GatewayError::Unavailable("connection refused".into()))
        }

        async fn set_password(&self, _id: &AccountId, _password: &str) -> Result<(), GatewayError> {
            Err(GatewayError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_outage_is_not_an_authorization_failure() {
        let chain = AuthorizationChain::new(TokenCodec::new("s"), Arc::new(DownGateway));
        let minted = chain.codec().encode_at(PartialSession::new(AccountId::new()), t0()).unwrap();

        let err = chain
            .authenticate(Some(&bearer(&minted.token)), t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Gateway(GatewayError::Unavailable(_))));
        assert_eq!(err.rejection(), None);
    }

    #[tokio::test]
    async fn verification_gate_runs_before_role_gates() {
        let fx = fixture();
        let account = seed(
            &fx.gateway,
            AccountFlags {
                verified: false,
                admin: false,
                ..AccountFlags::default()
            },
        );
        let minted = fx.chain.codec().encode_at(PartialSession::new(account.id), t0()).unwrap();

        let err = fx
            .chain
            .authorize(
                Some(&bearer(&minted.token)),
                &AccessPolicy::authenticated().verified().admin(),
                t0(),
            )
            .await
            .unwrap_err();
        assert_eq!(rejection(err.error), Rejection::Forbidden(ForbiddenReason::NotVerified));
    }

    #[tokio::test]
    async fn grace_refresh_survives_a_gate_rejection() {
        let fx = fixture();
        let account = seed(
            &fx.gateway,
            AccountFlags {
                verified: true,
                ..AccountFlags::default()
            },
        );
        let minted = fx.chain.codec().encode_at(PartialSession::new(account.id), t0()).unwrap();
        let at_20m = t0() + TimeDelta::minutes(20);

        let denied = fx
            .chain
            .authorize(
                Some(&bearer(&minted.token)),
                &AccessPolicy::authenticated().verified().admin(),
                at_20m,
            )
            .await
            .unwrap_err();

        let refreshed = denied.refreshed.expect("grace token should still be refreshed");
        assert_eq!(refreshed.issued, at_20m);
        assert_eq!(rejection(denied.error), Rejection::Forbidden(ForbiddenReason::NotAdmin));
    }

    #[tokio::test]
    async fn grace_refresh_survives_a_missing_account() {
        let fx = fixture();
        let account = seed(&fx.gateway, AccountFlags::default());
        let minted = fx.chain.codec().encode_at(PartialSession::new(account.id), t0()).unwrap();
        fx.gateway.remove(&account.id).unwrap();

        let denied = fx
            .chain
            .authorize(
                Some(&bearer(&minted.token)),
                &AccessPolicy::authenticated(),
                t0() + TimeDelta::minutes(20),
            )
            .await
            .unwrap_err();

        assert!(denied.refreshed.is_some());
        assert_eq!(rejection(denied.error), Rejection::AccountNotFound);
    }

    #[tokio::test]
    async fn active_token_rejection_carries_no_refresh() {
        let fx = fixture();
        let account = seed(&fx.gateway, AccountFlags::default());
        let minted = fx.chain.codec().encode_at(PartialSession::new(account.id), t0()).unwrap();

        let denied = fx
            .chain
            .authorize(
                Some(&bearer(&minted.token)),
                &AccessPolicy::authenticated().verified(),
                t0(),
            )
            .await
            .unwrap_err();

        assert_eq!(denied.refreshed, None);
        assert_eq!(rejection(denied.error), Rejection::Forbidden(ForbiddenReason::NotVerified));
    }

    #[tokio::test]
    async fn verified_admin_passes_admin_policy() {
        let fx = fixture();
        let account = seed(
            &fx.gateway,
            AccountFlags {
                verified: true,
                admin: true,
                ..AccountFlags::default()
            },
        );
        let minted = fx.chain.codec().encode_at(PartialSession::new(account.id), t0()).unwrap();

        let authorized = fx
            .chain
            .authorize(
                Some(&bearer(&minted.token)),
                &AccessPolicy::authenticated().verified().admin(),
                t0(),
            )
            .await
            .unwrap();
        assert_eq!(authorized.context.account.id, account.id);
    }

    #[test]
    fn admin_gate_requires_admin_flag() {
        let fx = fixture();
        let ctx = context_for(AccountFlags {
            verified: true,
            ..AccountFlags::default()
        });

        assert_eq!(
            fx.chain.check(&ctx, &AccessPolicy::authenticated().admin()),
            Err(Rejection::Forbidden(ForbiddenReason::NotAdmin))
        );
    }

    #[test]
    fn leo_without_admin_under_each_policy() {
        let ctx = context_for(AccountFlags {
            verified: true,
            leo: true,
            admin: false,
            ems: false,
        });
        let policy = AccessPolicy::authenticated().verified().leo();

        let both = fixture().chain.with_leo_policy(LeoPolicy::LeoAndAdmin);
        assert_eq!(
            both.check(&ctx, &policy),
            Err(Rejection::Forbidden(ForbiddenReason::NotLeo))
        );

        let either = fixture().chain.with_leo_policy(LeoPolicy::LeoOrAdmin);
        assert_eq!(either.check(&ctx, &policy), Ok(()));
    }

    #[test]
    fn default_leo_policy_requires_both_flags() {
        assert_eq!(LeoPolicy::default(), LeoPolicy::LeoAndAdmin);

        let flags = AccountFlags {
            leo: true,
            admin: true,
            ..AccountFlags::default()
        };
        assert!(LeoPolicy::default().permits(&flags));
        assert!(!LeoPolicy::default().permits(&AccountFlags { admin: false, ..flags }));
        assert!(LeoPolicy::LeoOrAdmin.permits(&AccountFlags { leo: false, ..flags }));
        assert!(!LeoPolicy::LeoOrAdmin.permits(&AccountFlags::default()));
    }

    #[test]
    fn leo_policy_parses_config_values() {
        assert_eq!("leo_or_admin".parse::<LeoPolicy>(), Ok(LeoPolicy::LeoOrAdmin));
        assert_eq!(" LEO_AND_ADMIN ".parse::<LeoPolicy>(), Ok(LeoPolicy::LeoAndAdmin));
        assert!("either".parse::<LeoPolicy>().is_err());
    }

    #[test]
    fn policy_builder_deduplicates_roles() {
        let policy = AccessPolicy::authenticated().admin().admin().leo();
        assert_eq!(policy.roles(), &[RoleGate::Admin, RoleGate::Leo]);
        assert!(!policy.requires_verified());
    }
}
