//! Configuration loading: a YAML file with one section per deployment
//! environment (`local`, `prod`, ...), selected by the `ENV` environment
//! variable, plus secrets loaded from a `.env` file. Mirrors
//! `BaseConfig`/`Config` from the original `config.py` one field at a time.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing .env file or unreadable environment: {0}")]
    Env(#[source] dotenvy::Error),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config file is not valid YAML: {0}")]
    Yaml(#[source] serde_yaml::Error),

    #[error("config has no section for ENV={0}")]
    MissingEnvSection(String),

    #[error("config field {field} has an invalid HHMMSS time: {value}")]
    BadTime { field: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
struct RawDatabase {
    host: String,
    port: u16,
    database: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawObserver {
    base_path: String,
    sf31_orders_dir: String,
    xq_signals_dir: String,
    order_callback_dir: String,
    order_callback_file: String,
    trade_callback_file: String,
    position_callback_file: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEngine {
    trade_start_time: String,
    trade_end_time: String,
    #[serde(default = "default_reset_time1")]
    reset_time1: String,
    #[serde(default = "default_reset_time2")]
    reset_time2: String,
    #[serde(default = "default_sync_interval_secs")]
    sync_interval_secs: u32,
    #[serde(default = "default_snapshot_interval_secs")]
    snapshot_interval_secs: u32,
    #[serde(default = "default_max_hold_interval_secs")]
    max_hold_interval_secs: u64,
}

fn default_max_hold_interval_secs() -> u64 {
    2
}

fn default_reset_time1() -> String {
    "061500".to_string()
}

fn default_reset_time2() -> String {
    "133500".to_string()
}

fn default_sync_interval_secs() -> u32 {
    5
}

fn default_snapshot_interval_secs() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
struct RawOrderManager {
    daily_amount_limit: Decimal,
    #[serde(default = "default_strategy_amount_limit")]
    strategy_amount_limit: Decimal,
}

fn default_strategy_amount_limit() -> Decimal {
    Decimal::MAX
}

#[derive(Debug, Clone, Deserialize)]
struct RawLogging {
    sink_dir: String,
    sink_file: String,
    level: String,
    #[serde(default)]
    json: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCommon {
    checkpoints_dir: String,
    #[serde(default = "default_quote_delay_tolerance_secs")]
    quote_delay_tolerance_secs: i64,
}

fn default_quote_delay_tolerance_secs() -> i64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
struct RawSection {
    database: RawDatabase,
    observer: RawObserver,
    engine: RawEngine,
    order_manager: RawOrderManager,
    loguru: RawLogging,
    common: RawCommon,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObserverPathsConfig {
    pub base_path: String,
    pub sf31_orders_dir: String,
    pub xq_signals_dir: String,
    pub order_callback_dir: String,
    pub order_callback_file: String,
    pub trade_callback_file: String,
    pub position_callback_file: String,
}

#[derive(Debug, Clone)]
pub struct EngineTimesConfig {
    pub trade_start_time: NaiveTime,
    pub trade_end_time: NaiveTime,
    pub reset_time1: NaiveTime,
    pub reset_time2: NaiveTime,
    pub sync_interval_secs: u32,
    pub snapshot_interval_secs: u32,
    pub max_hold_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub sink_dir: String,
    pub sink_file: String,
    pub level: String,
    pub json: bool,
}

/// The engine's correlation retry ceilings and the sentinel strategy id
/// used once an Order callback exhausts its retries unmatched.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationConfig {
    pub order_callback_max_retries: u32,
    pub trade_callback_max_retries: u32,
    pub sentinel_strategy_id: i64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self { order_callback_max_retries: 10, trade_callback_max_retries: 20, sentinel_strategy_id: 7 }
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub debug: bool,
    pub database: DatabaseConfig,
    pub observer: ObserverPathsConfig,
    pub engine: EngineTimesConfig,
    pub daily_amount_limit: Decimal,
    pub strategy_amount_limit: Decimal,
    pub logging: LoggingConfig,
    pub checkpoints_dir: String,
    pub quote_delay_tolerance_secs: i64,
    pub correlation: CorrelationConfig,
}

fn parse_hhmmss(field: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    if value.len() != 6 {
        return Err(ConfigError::BadTime { field, value: value.to_string() });
    }
    let hour: u32 = value[0..2].parse().map_err(|_| ConfigError::BadTime { field, value: value.to_string() })?;
    let minute: u32 = value[2..4].parse().map_err(|_| ConfigError::BadTime { field, value: value.to_string() })?;
    let second: u32 = value[4..6].parse().map_err(|_| ConfigError::BadTime { field, value: value.to_string() })?;
    NaiveTime::from_hms_opt(hour, minute, second).ok_or(ConfigError::BadTime { field, value: value.to_string() })
}

impl RouterConfig {
    /// Loads `.env` (secrets) then `config_path` (everything else),
    /// selecting the section named by `env_flag` (typically `$ENV`).
    pub fn load(config_path: &Path, env_flag: &str) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) | Err(dotenvy::Error::Io(_)) => {}
            Err(err) => return Err(ConfigError::Env(err)),
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|source| ConfigError::Io { path: config_path.display().to_string(), source })?;
        let mut sections: HashMap<String, RawSection> =
            serde_yaml::from_str(&contents).map_err(ConfigError::Yaml)?;
        let section = sections
            .remove(env_flag)
            .ok_or_else(|| ConfigError::MissingEnvSection(env_flag.to_string()))?;

        Ok(Self {
            debug: env_flag == "local",
            database: DatabaseConfig {
                host: section.database.host,
                port: section.database.port,
                database: section.database.database,
                user: std::env::var("DB_USER").ok(),
                password: std::env::var("DB_PASSWORD").ok(),
            },
            observer: ObserverPathsConfig {
                base_path: section.observer.base_path,
                sf31_orders_dir: section.observer.sf31_orders_dir,
                xq_signals_dir: section.observer.xq_signals_dir,
                order_callback_dir: section.observer.order_callback_dir,
                order_callback_file: section.observer.order_callback_file,
                trade_callback_file: section.observer.trade_callback_file,
                position_callback_file: section.observer.position_callback_file,
            },
            engine: EngineTimesConfig {
                trade_start_time: parse_hhmmss("engine.trade_start_time", &section.engine.trade_start_time)?,
                trade_end_time: parse_hhmmss("engine.trade_end_time", &section.engine.trade_end_time)?,
                reset_time1: parse_hhmmss("engine.reset_time1", &section.engine.reset_time1)?,
                reset_time2: parse_hhmmss("engine.reset_time2", &section.engine.reset_time2)?,
                sync_interval_secs: section.engine.sync_interval_secs,
                snapshot_interval_secs: section.engine.snapshot_interval_secs,
                max_hold_interval_secs: section.engine.max_hold_interval_secs,
            },
            daily_amount_limit: section.order_manager.daily_amount_limit,
            strategy_amount_limit: section.order_manager.strategy_amount_limit,
            logging: LoggingConfig {
                sink_dir: section.loguru.sink_dir,
                sink_file: section.loguru.sink_file,
                level: section.loguru.level,
                json: section.loguru.json,
            },
            checkpoints_dir: section.common.checkpoints_dir,
            quote_delay_tolerance_secs: section.common.quote_delay_tolerance_secs,
            correlation: CorrelationConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_YAML: &str = r#"
local:
  database:
    host: 127.0.0.1
    port: 5432
    database: router
  observer:
    base_path: ./data
    sf31_orders_dir: sf31_orders
    xq_signals_dir: xq_signals
    order_callback_dir: callbacks
    order_callback_file: order.log
    trade_callback_file: trade.log
    position_callback_file: position.log
  engine:
    trade_start_time: "090000"
    trade_end_time: "133000"
  order_manager:
    daily_amount_limit: "1000000"
  loguru:
    sink_dir: ./logs
    sink_file: router.log
    level: INFO
  common:
    checkpoints_dir: ./checkpoints
"#;

    #[test]
    fn loads_the_selected_environment_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_YAML.as_bytes()).unwrap();

        let config = RouterConfig::load(file.path(), "local").unwrap();
        assert!(config.debug);
        assert_eq!(config.engine.trade_start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(config.engine.sync_interval_secs, 5);
        assert_eq!(config.correlation.sentinel_strategy_id, 7);
    }

    #[test]
    fn missing_section_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_YAML.as_bytes()).unwrap();

        let err = RouterConfig::load(file.path(), "prod").unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvSection(_)));
    }
}
