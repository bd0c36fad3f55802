//! Process configuration, read once at startup.

use cad_auth::LeoPolicy;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingSecret,

    #[error("invalid PORT '{0}'")]
    InvalidPort(String),

    #[error("invalid CAD_LEO_POLICY: {0}")]
    InvalidLeoPolicy(String),

    #[error("CAD_BOOTSTRAP_ADMIN_EMAIL and CAD_BOOTSTRAP_ADMIN_PASSWORD must be set together")]
    IncompleteBootstrapAdmin,
}

/// Credentials for an administrator seeded at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Signs and verifies every session token. Changing it invalidates all
    /// outstanding tokens.
    pub jwt_secret: String,
    pub port: u16,
    pub leo_policy: LeoPolicy,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"<redacted>")
            .field("port", &self.port)
            .field("leo_policy", &self.leo_policy)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .finish()
    }
}

impl AppConfig {
    /// Defaults for everything but the secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            port: DEFAULT_PORT,
            leo_policy: LeoPolicy::default(),
            bootstrap_admin: None,
        }
    }

    pub fn with_leo_policy(mut self, leo_policy: LeoPolicy) -> Self {
        self.leo_policy = leo_policy;
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = non_empty("JWT_SECRET").ok_or(ConfigError::MissingSecret)?;

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let leo_policy = match non_empty("CAD_LEO_POLICY") {
            Some(raw) => raw.parse().map_err(ConfigError::InvalidLeoPolicy)?,
            None => LeoPolicy::default(),
        };

        let bootstrap_admin = match (
            non_empty("CAD_BOOTSTRAP_ADMIN_EMAIL"),
            non_empty("CAD_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => return Err(ConfigError::IncompleteBootstrapAdmin),
        };

        Ok(Self {
            jwt_secret,
            port,
            leo_policy,
            bootstrap_admin,
        })
    }
}
