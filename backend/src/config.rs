use anyhow::{anyhow, bail};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr};

const MIN_TOKEN_SIZE_IN_BYTES: usize = 16;
const MAX_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;
const MAX_REFRESH_TOKEN_TTL_DAYS: u64 = 10 * 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_addr: String,
    pub token_size_in_bytes: usize,
    pub token_ttl_seconds: u64,
    pub token_rolling_ttl_seconds: u64,
    pub refresh_token_ttl_days: u64,
    pub max_tokens_per_user: usize,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
    pub password_hash_parallelism: u32,
    pub cors_allow_origins: Vec<String>,
}

/// Immutable session policy shared by the codec, the stores and the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicyConfig {
    pub token_size_in_bytes: usize,
    pub token_ttl: Duration,
    pub token_rolling_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub max_tokens_per_user: usize,
}

impl Default for AuthPolicyConfig {
    fn default() -> Self {
        Self {
            token_size_in_bytes: 32,
            token_ttl: Duration::hours(24),
            token_rolling_ttl: Duration::hours(1),
            refresh_token_ttl: Duration::days(30),
            max_tokens_per_user: 3,
        }
    }
}

/// Argon2 cost parameters for password hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordHashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/agenda".to_string());
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let token_size_in_bytes: usize = parse_env("TOKEN_SIZE_IN_BYTES", 32)?;
        if token_size_in_bytes < MIN_TOKEN_SIZE_IN_BYTES {
            bail!(
                "TOKEN_SIZE_IN_BYTES must be at least {}, got {}",
                MIN_TOKEN_SIZE_IN_BYTES,
                token_size_in_bytes
            );
        }

        let max_tokens_per_user: usize = parse_env("MAX_TOKENS_PER_USER", 3)?;
        if max_tokens_per_user == 0 {
            bail!("MAX_TOKENS_PER_USER must be at least 1");
        }

        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let config = Config {
            database_url,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 10)?,
            server_addr,
            token_size_in_bytes,
            token_ttl_seconds: parse_env("TOKEN_TTL_SECONDS", 24 * 60 * 60)?,
            token_rolling_ttl_seconds: parse_env("TOKEN_ROLLING_TTL_SECONDS", 60 * 60)?,
            refresh_token_ttl_days: parse_env("REFRESH_TOKEN_TTL_DAYS", 30)?,
            max_tokens_per_user,
            password_hash_memory_kib: parse_env("PASSWORD_HASH_MEMORY_KIB", 19 * 1024)?,
            password_hash_iterations: parse_env("PASSWORD_HASH_ITERATIONS", 2)?,
            password_hash_parallelism: parse_env("PASSWORD_HASH_PARALLELISM", 1)?,
            cors_allow_origins,
        };
        config.auth_policy()?;
        Ok(config)
    }

    /// Converts the raw TTL settings, rejecting zero and values past the
    /// supported maximum so expiry arithmetic can never overflow.
    pub fn auth_policy(&self) -> anyhow::Result<AuthPolicyConfig> {
        Ok(AuthPolicyConfig {
            token_size_in_bytes: self.token_size_in_bytes,
            token_ttl: ttl(
                "TOKEN_TTL_SECONDS",
                self.token_ttl_seconds,
                MAX_TOKEN_TTL_SECONDS,
                Duration::try_seconds,
            )?,
            token_rolling_ttl: ttl(
                "TOKEN_ROLLING_TTL_SECONDS",
                self.token_rolling_ttl_seconds,
                MAX_TOKEN_TTL_SECONDS,
                Duration::try_seconds,
            )?,
            refresh_token_ttl: ttl(
                "REFRESH_TOKEN_TTL_DAYS",
                self.refresh_token_ttl_days,
                MAX_REFRESH_TOKEN_TTL_DAYS,
                Duration::try_days,
            )?,
            max_tokens_per_user: self.max_tokens_per_user,
        })
    }

    pub fn password_hash(&self) -> PasswordHashConfig {
        PasswordHashConfig {
            memory_kib: self.password_hash_memory_kib,
            iterations: self.password_hash_iterations,
            parallelism: self.password_hash_parallelism,
        }
    }

    /// Database URL with any password component replaced, for logging.
    pub fn masked_database_url(&self) -> String {
        mask_url_password(&self.database_url)
    }
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

fn ttl(
    key: &str,
    value: u64,
    max: u64,
    unit: fn(i64) -> Option<Duration>,
) -> anyhow::Result<Duration> {
    if value == 0 || value > max {
        bail!("{} must be between 1 and {}, got {}", key, max, value);
    }
    let value = i64::try_from(value).map_err(|_| anyhow!("{} is out of range", key))?;
    unit(value).ok_or_else(|| anyhow!("{} is out of range", key))
}

fn mask_url_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.split_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => url.to_string(),
    }
}
