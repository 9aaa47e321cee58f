//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// Network listen configuration.
    pub listen: ListenConfig,
    /// Database configuration.
    pub database: Option<DatabaseConfig>,
    /// Reward multipliers.
    #[serde(default)]
    pub rates: RatesConfig,
    /// Simulation tuning.
    #[serde(default)]
    pub game: GameConfig,
}

/// Server identity and logging.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name shown in logs and the login notice.
    pub name: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus metrics port. 0 disables the HTTP endpoint (used by tests).
    pub metrics_port: Option<u16>,
    /// Directory for clan emblem files.
    #[serde(default = "default_emblem_dir")]
    pub emblem_dir: String,
}

/// Log output format selector.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    #[default]
    Pretty,
}

/// Network listen configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListenConfig {
    /// Client listen address.
    pub addr: SocketAddr,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path, or ":memory:".
    pub path: String,
}

/// Reward multipliers applied at kill/drop time.
#[derive(Debug, Clone, Deserialize)]
pub struct RatesConfig {
    /// Experience multiplier.
    #[serde(default = "default_rate")]
    pub exp: f64,
    /// Pet experience multiplier.
    #[serde(default = "default_rate")]
    pub pet_exp: f64,
    /// Item drop chance multiplier.
    #[serde(default = "default_rate")]
    pub drop: f64,
    /// Adena drop amount multiplier.
    #[serde(default = "default_rate")]
    pub adena: f64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            exp: 1.0,
            pet_exp: 1.0,
            drop: 1.0,
            adena: 1.0,
        }
    }
}

/// Simulation tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Per-session inbound queue capacity.
    #[serde(default = "default_session_queue")]
    pub session_queue: usize,
    /// Packets drained per session per tick.
    #[serde(default = "default_packets_per_tick")]
    pub packets_per_tick: usize,
    /// Visibility radius in tiles.
    #[serde(default = "default_visibility_radius")]
    pub visibility_radius: i32,
    /// Maximum party size.
    #[serde(default = "default_max_party_size")]
    pub max_party_size: usize,
    /// Dirty-player save interval, in ticks.
    #[serde(default = "default_save_interval")]
    pub save_interval_ticks: u64,
    /// Per-save database timeout, in seconds.
    #[serde(default = "default_save_timeout")]
    pub save_timeout_secs: u64,
    /// Ground item lifetime, in ticks.
    #[serde(default = "default_ground_item_ttl")]
    pub ground_item_ttl: u32,
    /// Personal warehouse withdraw fee, in adena.
    #[serde(default = "default_warehouse_fee")]
    pub warehouse_fee: u32,
    /// Minimum clan rank allowed to use the clan warehouse.
    #[serde(default = "default_clan_warehouse_rank")]
    pub clan_warehouse_rank: u8,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            session_queue: default_session_queue(),
            packets_per_tick: default_packets_per_tick(),
            visibility_radius: default_visibility_radius(),
            max_party_size: default_max_party_size(),
            save_interval_ticks: default_save_interval(),
            save_timeout_secs: default_save_timeout(),
            ground_item_ttl: default_ground_item_ttl(),
            warehouse_fee: default_warehouse_fee(),
            clan_warehouse_rank: default_clan_warehouse_rank(),
        }
    }
}

fn default_rate() -> f64 {
    1.0
}

fn default_emblem_dir() -> String {
    "emblem".to_string()
}

fn default_session_queue() -> usize {
    256
}

fn default_packets_per_tick() -> usize {
    16
}

fn default_visibility_radius() -> i32 {
    20
}

fn default_max_party_size() -> usize {
    8
}

fn default_save_interval() -> u64 {
    // 5 minutes at 5 Hz.
    1500
}

fn default_save_timeout() -> u64 {
    5
}

fn default_ground_item_ttl() -> u32 {
    // 10 minutes at 5 Hz.
    3000
}

fn default_warehouse_fee() -> u32 {
    30
}

fn default_clan_warehouse_rank() -> u8 {
    4
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(Path::new(path))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Validate a loaded configuration, collecting every problem at once.
pub fn validate(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.server.name.is_empty() {
        errors.push("server.name must not be empty".to_string());
    }
    if config.game.session_queue == 0 {
        errors.push("game.session_queue must be at least 1".to_string());
    }
    if config.game.packets_per_tick == 0 {
        errors.push("game.packets_per_tick must be at least 1".to_string());
    }
    if config.game.visibility_radius < 1 {
        errors.push("game.visibility_radius must be at least 1".to_string());
    }
    if config.game.max_party_size < 2 {
        errors.push("game.max_party_size must be at least 2".to_string());
    }
    if !(3..=10).contains(&config.game.save_timeout_secs) {
        errors.push("game.save_timeout_secs must be between 3 and 10".to_string());
    }
    if !(2..=10).contains(&config.game.clan_warehouse_rank) {
        errors.push("game.clan_warehouse_rank must be a clan rank (2-10)".to_string());
    }
    for (name, rate) in [
        ("rates.exp", config.rates.exp),
        ("rates.pet_exp", config.rates.pet_exp),
        ("rates.drop", config.rates.drop),
        ("rates.adena", config.rates.adena),
    ] {
        if !rate.is_finite() || rate < 0.0 {
            errors.push(format!("{name} must be a non-negative number"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Config {
        toml::from_str(
            r#"
            [server]
            name = "runegate-test"

            [listen]
            addr = "127.0.0.1:2000"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_fill_in() {
        let cfg = minimal();
        assert_eq!(cfg.game.session_queue, 256);
        assert_eq!(cfg.game.visibility_radius, 20);
        assert_eq!(cfg.rates.exp, 1.0);
        assert_eq!(cfg.server.log_format, LogFormat::Pretty);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn validate_collects_all_errors() {
        let mut cfg = minimal();
        cfg.server.name.clear();
        cfg.game.save_timeout_secs = 60;
        cfg.rates.exp = -1.0;
        let errors = validate(&cfg).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
