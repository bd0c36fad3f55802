//! Account store wiring for the binary.

use std::sync::Arc;

use anyhow::Context;

use cad_auth::{Account, AccountFlags, InMemoryAccountGateway};
use cad_core::AccountId;

use crate::config::AppConfig;

/// In-memory account store, seeded with the bootstrap administrator if configured.
pub fn in_memory_accounts(config: &AppConfig) -> anyhow::Result<Arc<InMemoryAccountGateway>> {
    let gateway = InMemoryAccountGateway::new();

    if let Some(admin) = &config.bootstrap_admin {
        let account = Account {
            flags: AccountFlags {
                verified: true,
                admin: true,
                ..AccountFlags::default()
            },
            ..Account::new(AccountId::new(), admin.email.clone())
        };
        let id = account.id;
        gateway
            .insert(account, &admin.password)
            .context("failed to seed bootstrap admin")?;
        tracing::info!(account_id = %id, email = %admin.email, "seeded bootstrap admin");
    } else {
        tracing::warn!("no bootstrap admin configured; admin routes are unreachable until one is granted");
    }

    Ok(Arc::new(gateway))
}
