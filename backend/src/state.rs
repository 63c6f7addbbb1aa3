use std::sync::Arc;

use crate::{
    config::Config,
    db::connection::DbPool,
    repositories::{
        InMemorySessionStore, InMemoryUserRepository, PgSessionStore, PgUserRepository,
        SessionStore, UserRepository,
    },
    services::{AccountService, AuthPolicy, AuthenticationPipeline},
    utils::{password::CredentialHasher, token::TokenCodec},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<dyn SessionStore>,
    pub pipeline: AuthenticationPipeline,
    pub accounts: AccountService,
}

impl AppState {
    /// Wires the services over the given stores. Fails only on invalid
    /// password hashing parameters.
    pub fn new(
        config: Config,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionStore>,
    ) -> anyhow::Result<Self> {
        let policy = AuthPolicy::new(config.auth_policy()?);
        let codec = TokenCodec::new(config.token_size_in_bytes);
        let hasher = CredentialHasher::new(config.password_hash())?;

        let pipeline =
            AuthenticationPipeline::new(sessions.clone(), users.clone(), codec, policy);
        let accounts = AccountService::new(users, sessions.clone(), hasher, codec);

        Ok(Self {
            config,
            sessions,
            pipeline,
            accounts,
        })
    }

    pub fn postgres(pool: DbPool, config: Config) -> anyhow::Result<Self> {
        let policy = AuthPolicy::new(config.auth_policy()?);
        let sessions = Arc::new(PgSessionStore::new(pool.clone(), policy));
        let users = Arc::new(PgUserRepository::new(pool));
        Self::new(config, users, sessions)
    }

    /// Process-local state; nothing survives a restart.
    pub fn in_memory(config: Config) -> anyhow::Result<Self> {
        let policy = AuthPolicy::new(config.auth_policy()?);
        let sessions = Arc::new(InMemorySessionStore::new(policy));
        let users = Arc::new(InMemoryUserRepository::new());
        Self::new(config, users, sessions)
    }
}
