use std::{env, ops::RangeInclusive, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env`) at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub posts_per_page: usize,
    pub index_cache_ttl: Duration,
    pub index_cache_max_entries: usize,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub login_attempts_per_minute: u32,
    pub max_concurrent_requests: usize,
}

impl Config {
    /// Defaults for everything except the JWT secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            jwt_secret: jwt_secret.into(),
            posts_per_page: 10,
            index_cache_ttl: Duration::from_secs(20),
            index_cache_max_entries: 300,
            token_ttl_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            login_attempts_per_minute: 10,
            max_concurrent_requests: 1024,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        let mut config = Self::with_secret(jwt_secret);

        if let Ok(addr) = env::var("BIND_ADDR") {
            config.bind_addr = addr;
        }
        config.posts_per_page = parse_var("POSTS_PER_PAGE", config.posts_per_page)?;
        config.index_cache_ttl = Duration::from_secs(parse_var(
            "INDEX_CACHE_SECONDS",
            config.index_cache_ttl.as_secs(),
        )?);
        config.token_ttl_hours = parse_var("TOKEN_TTL_HOURS", config.token_ttl_hours)?;
        config.bcrypt_cost = parse_var("BCRYPT_COST", config.bcrypt_cost)?;
        config.login_attempts_per_minute =
            parse_var("LOGIN_ATTEMPTS_PER_MINUTE", config.login_attempts_per_minute)?;
        config.max_concurrent_requests =
            parse_var("MAX_CONCURRENT_REQUESTS", config.max_concurrent_requests)?;

        config.index_cache_max_entries =
            parse_var("INDEX_CACHE_MAX_ENTRIES", config.index_cache_max_entries)?;

        config.validate()
    }

    /// Rejects values the server cannot run with.
    pub fn validate(self) -> Result<Self, ConfigError> {
        check_range("POSTS_PER_PAGE", self.posts_per_page, 1..=usize::MAX)?;
        check_range("TOKEN_TTL_HOURS", self.token_ttl_hours, 1..=MAX_TOKEN_TTL_HOURS)?;
        check_range("BCRYPT_COST", self.bcrypt_cost, BCRYPT_COSTS)?;
        check_range("LOGIN_ATTEMPTS_PER_MINUTE", self.login_attempts_per_minute, 1..=u32::MAX)?;
        check_range("MAX_CONCURRENT_REQUESTS", self.max_concurrent_requests, 1..=usize::MAX)?;
        check_range("INDEX_CACHE_MAX_ENTRIES", self.index_cache_max_entries, 1..=usize::MAX)?;
        Ok(self)
    }
}

/// Ten years.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365 * 10;

const BCRYPT_COSTS: RangeInclusive<u32> = 4..=31;

fn check_range<T>(name: &'static str, value: T, range: RangeInclusive<T>) -> Result<(), ConfigError>
where
    T: PartialOrd + ToString,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
