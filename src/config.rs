//! # config — settings read from environment variables
//!
//! | Variable                | Default               | Description                      |
//! |-------------------------|-----------------------|----------------------------------|
//! | `BIND_ADDR`             | `0.0.0.0:3000`        | Address Axum listens on          |
//! | `STORAGE_DIR`           | `.proxyboard`         | Directory of the snapshot files  |
//! | `STORAGE_KEY`           | `proxy-trading-state` | Key the snapshot is stored under |
//! | `PERSIST_DEBOUNCE_MS`   | `500`                 | Persistence debounce window      |
//! | `TICK_INTERVAL_MS`      | `1500`                | Simulation tick period           |
//! | `MUTATION_LOG_CAPACITY` | `200`                 | Mutation records kept            |
//! | `HISTORY_CAPACITY`      | `50`                  | Price points kept per symbol     |
//! | `SIMULATION_AUTOSTART`  | `false`               | Start simulating at boot         |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::engine::persistence::{DEFAULT_DEBOUNCE, DEFAULT_STORAGE_KEY};
use crate::engine::simulator::DEFAULT_TICK_INTERVAL;
use crate::store::StoreOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub storage_dir: PathBuf,
    pub storage_key: String,
    pub persist_debounce: Duration,
    pub tick_interval: Duration,
    pub store: StoreOptions,
    pub autostart: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr)?,
            storage_dir: std::env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            storage_key: std::env::var("STORAGE_KEY").unwrap_or(defaults.storage_key),
            persist_debounce: Duration::from_millis(env_or(
                "PERSIST_DEBOUNCE_MS",
                defaults.persist_debounce.as_millis() as u64,
            )?),
            tick_interval: Duration::from_millis(env_or(
                "TICK_INTERVAL_MS",
                defaults.tick_interval.as_millis() as u64,
            )?),
            store: StoreOptions {
                log_capacity: env_or("MUTATION_LOG_CAPACITY", defaults.store.log_capacity)?,
                history_capacity: env_or("HISTORY_CAPACITY", defaults.store.history_capacity)?,
            },
            autostart: std::env::var("SIMULATION_AUTOSTART")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.autostart),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            storage_dir: PathBuf::from(".proxyboard"),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            persist_debounce: DEFAULT_DEBOUNCE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            store: StoreOptions::default(),
            autostart: false,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be a valid value, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard_behaviour() {
        let config = Config::default();
        assert_eq!(config.persist_debounce, Duration::from_millis(500));
        assert_eq!(config.tick_interval, Duration::from_millis(1500));
        assert_eq!(config.store.log_capacity, 200);
        assert_eq!(config.store.history_capacity, 50);
        assert_eq!(config.storage_key, "proxy-trading-state");
        assert!(!config.autostart);
    }

    #[test]
    fn test_env_or_reports_bad_values() {
        std::env::set_var("PROXYBOARD_TEST_NUMBER", "twelve");
        let err = env_or::<u64>("PROXYBOARD_TEST_NUMBER", 1).unwrap_err();
        assert!(err.to_string().contains("PROXYBOARD_TEST_NUMBER"));

        std::env::set_var("PROXYBOARD_TEST_NUMBER", "12");
        assert_eq!(env_or::<u64>("PROXYBOARD_TEST_NUMBER", 1).unwrap(), 12);
        assert_eq!(env_or::<u64>("PROXYBOARD_TEST_UNSET", 9).unwrap(), 9);
    }
}
