//! Environment configuration

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::aggregates::TransitionPolicy;

pub const DEFAULT_PORT: u16 = 8083;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_SUBJECT_PREFIX: &str = "storefront";
pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid { var: &'static str, value: String, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// `None` selects the in-memory backend.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub currency: String,
    pub transition_policy: TransitionPolicy,
    /// Products to preload when running on the in-memory backend.
    pub catalog_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            nats_url: None,
            nats_subject_prefix: DEFAULT_SUBJECT_PREFIX.into(),
            currency: DEFAULT_CURRENCY.into(),
            transition_policy: TransitionPolicy::default(),
            catalog_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => parse_number("PORT", raw)?,
            None => defaults.port,
        };
        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => {
                let n: u32 = parse_number("DATABASE_MAX_CONNECTIONS", raw.clone())?;
                if n == 0 {
                    return Err(invalid("DATABASE_MAX_CONNECTIONS", raw, "must be at least 1"));
                }
                n
            }
            None => defaults.database_max_connections,
        };
        let currency = match get("STORE_CURRENCY") {
            Some(raw) if raw.len() == 3 && raw.chars().all(|c| c.is_ascii_alphabetic()) => raw.to_ascii_uppercase(),
            Some(raw) => return Err(invalid("STORE_CURRENCY", raw, "expected a three-letter currency code")),
            None => defaults.currency,
        };
        let transition_policy = match get("ORDER_TRANSITION_POLICY") {
            Some(raw) => raw.parse().map_err(|_| invalid("ORDER_TRANSITION_POLICY", raw, "expected permissive or forward-only"))?,
            None => defaults.transition_policy,
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            database_max_connections,
            nats_url: get("NATS_URL"),
            nats_subject_prefix: get("NATS_SUBJECT_PREFIX").unwrap_or(defaults.nats_subject_prefix),
            currency,
            transition_policy,
            catalog_file: get("CATALOG_FILE").map(PathBuf::from),
        })
    }
}

fn invalid(var: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { var, value, reason: reason.into() }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: String) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| invalid(var, raw.clone(), e.to_string()))
}
