//! Configuration for meateye-fridge
//!
//! Priority: command line → environment (`MEATEYE_*`) → TOML file → defaults.

use clap::Parser;
use meateye_common::time::offset_from_hours;
use meateye_common::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::services::SchedulerSettings;

/// Upper bound for retry and claim delays (30 days)
pub const MAX_DELAY_SECS: i64 = 30 * 24 * 3600;

/// Command-line arguments for meateye-fridge
#[derive(Parser, Debug, Default)]
#[command(name = "meateye-fridge")]
#[command(about = "Fridge lifecycle and expiry notification service for Meat-A-Eye")]
#[command(version)]
pub struct Cli {
    /// Root folder holding the database
    #[arg(short, long)]
    pub root_folder: Option<String>,

    /// Explicit TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8000
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Service settings with compiled defaults
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FridgeConfig {
    pub bind_address: String,
    pub traceability_api_url: String,
    /// Empty disables enrichment
    pub traceability_api_key: String,
    pub traceability_timeout_secs: u64,
    /// Empty means no push relay; push attempts fail transiently
    pub push_relay_url: String,
    pub push_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: u32,
    pub max_attempts: u32,
    pub retry_base_secs: i64,
    pub retry_max_secs: i64,
    pub claim_timeout_secs: i64,
    pub alert_hour: u32,
    pub utc_offset_hours: i32,
    pub default_shelf_life_days: u32,
}

impl Default for FridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
            traceability_api_url:
                "http://data.ekape.or.kr/openapi-data/service/user/animalTrace/traceNoSearch".to_string(),
            traceability_api_key: String::new(),
            traceability_timeout_secs: 10,
            push_relay_url: String::new(),
            push_timeout_secs: 10,
            sweep_interval_secs: 60,
            sweep_batch_size: 100,
            max_attempts: 3,
            retry_base_secs: 60,
            retry_max_secs: 3600,
            claim_timeout_secs: 300,
            alert_hour: 9,
            utc_offset_hours: 9,
            default_shelf_life_days: 3,
        }
    }
}

impl FridgeConfig {
    /// Resolve from the TOML table, the process environment and the CLI
    pub fn load(cli: &Cli, toml_config: Option<&toml::Table>) -> Result<Self> {
        let mut config = Self::from_toml(toml_config)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        if let Some(bind) = &cli.bind {
            config.bind_address = bind.clone();
        }
        config.validate()?;

        info!(
            bind_address = %config.bind_address,
            enrichment = !config.traceability_api_key.is_empty(),
            push_relay = !config.push_relay_url.is_empty(),
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Defaults overlaid with the keys present in `table`
    ///
    /// Keys this service does not know (such as `root_folder`) are ignored.
    pub fn from_toml(table: Option<&toml::Table>) -> Result<Self> {
        match table {
            Some(table) => toml::Value::Table(table.clone())
                .try_into::<FridgeConfig>()
                .map_err(|e| Error::Config(format!("Invalid configuration: {}", e))),
            None => Ok(Self::default()),
        }
    }

    /// Override fields from `MEATEYE_<KEY>` variables supplied by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, value: String) -> Result<T> {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| Error::Config(format!("{} has an invalid value: {}", key, value)))
        }

        macro_rules! env_override {
            ($field:ident, string) => {{
                let key = concat!("MEATEYE_", stringify!($field)).to_uppercase();
                if let Some(value) = lookup(&key) {
                    self.$field = value;
                }
            }};
            ($field:ident) => {{
                let key = concat!("MEATEYE_", stringify!($field)).to_uppercase();
                if let Some(value) = lookup(&key) {
                    self.$field = parsed(&key, value)?;
                }
            }};
        }

        env_override!(bind_address, string);
        env_override!(traceability_api_url, string);
        env_override!(traceability_api_key, string);
        env_override!(traceability_timeout_secs);
        env_override!(push_relay_url, string);
        env_override!(push_timeout_secs);
        env_override!(sweep_interval_secs);
        env_override!(sweep_batch_size);
        env_override!(max_attempts);
        env_override!(retry_base_secs);
        env_override!(retry_max_secs);
        env_override!(claim_timeout_secs);
        env_override!(alert_hour);
        env_override!(utc_offset_hours);
        env_override!(default_shelf_life_days);

        Ok(())
    }

    /// Reject values the scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        if self.sweep_batch_size == 0 {
            return Err(Error::Config("sweep_batch_size must be at least 1".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config("sweep_interval_secs must be at least 1".to_string()));
        }
        if self.alert_hour > 23 {
            return Err(Error::Config(format!("alert_hour {} is not an hour of day", self.alert_hour)));
        }
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(Error::Config(format!("utc_offset_hours {} is out of range", self.utc_offset_hours)));
        }
        if self.retry_base_secs <= 0 || self.retry_max_secs < self.retry_base_secs {
            return Err(Error::Config(
                "retry_base_secs must be positive and not exceed retry_max_secs".to_string(),
            ));
        }
        for (key, secs) in [
            ("retry_max_secs", self.retry_max_secs),
            ("claim_timeout_secs", self.claim_timeout_secs),
        ] {
            if !(1..=MAX_DELAY_SECS).contains(&secs) {
                return Err(Error::Config(format!(
                    "{} must be between 1 and {} (got {})",
                    key, MAX_DELAY_SECS, secs
                )));
            }
        }
        Ok(())
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            batch_size: self.sweep_batch_size,
            max_attempts: self.max_attempts,
            retry_base: chrono::Duration::seconds(self.retry_base_secs),
            retry_max: chrono::Duration::seconds(self.retry_max_secs),
            claim_timeout: chrono::Duration::seconds(self.claim_timeout_secs.max(1)),
            send_timeout: Duration::from_secs(self.push_timeout_secs.max(1)),
            alert_hour: self.alert_hour,
            utc_offset: offset_from_hours(self.utc_offset_hours),
        }
    }

    pub fn traceability_timeout(&self) -> Duration {
        Duration::from_secs(self.traceability_timeout_secs.max(1))
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
