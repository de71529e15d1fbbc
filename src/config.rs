//! Process configuration.
//!
//! Two knobs, both read from the environment (a `.env` file is loaded first
//! when present):
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `COURIER_ADDR` | `0.0.0.0:3000` | listen address |
//! | `COURIER_ENV` | `development` | `development` or `production` |
//!
//! Development mode is what [`error_handler`](crate::middleware::error_handler)
//! receives: stack traces in error bodies and logged faults.

use std::net::SocketAddr;

use tracing::error;

use crate::error::ConfigError;

const ADDR_KEY: &str = "COURIER_ADDR";
const ENV_KEY: &str = "COURIER_ENV";
const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub dev: bool,
}

impl Config {
    /// Loads `.env` (if any), then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is the normal case in production.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_addr = lookup(ADDR_KEY).unwrap_or_else(|| DEFAULT_ADDR.to_owned());
        let addr = raw_addr.parse().map_err(|source| ConfigError::InvalidAddress {
            value: raw_addr.clone(),
            source,
        })?;

        let dev = match lookup(ENV_KEY).as_deref().map(str::trim) {
            None | Some("") => true,
            Some(v) if v.eq_ignore_ascii_case("development") => true,
            Some(v) if v.eq_ignore_ascii_case("production") => false,
            Some(v) => {
                return Err(ConfigError::InvalidEnv { key: ENV_KEY, value: v.to_owned() });
            }
        };

        Ok(Self { addr, dev })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { addr: SocketAddr::from(([0, 0, 0, 0], 3000)), dev: true }
    }
}

/// Logs an unrecoverable setup error and terminates the process.
///
/// For faults that make serving pointless: a controller whose dependencies
/// are not registered, a route bound to a method that does not exist.
pub fn fatal(err: impl Into<ConfigError>) -> ! {
    let err = err.into();
    error!(error = %err, "fatal configuration error");
    std::process::exit(1)
}
