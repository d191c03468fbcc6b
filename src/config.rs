//! Configuration management for maintwatch
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from a `maintwatch.toml` file and merge it
//! with environment variables and command-line arguments.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the notification store.
    pub store: StoreConfig,
    /// Configuration for the realtime WebSocket listener.
    pub realtime: RealtimeConfig,
    /// Configuration for push delivery.
    pub push: PushConfig,
    /// Cadences for the periodic jobs.
    pub scheduler: SchedulerConfig,
    /// Configuration for the anti-storm window.
    pub deduplication: DeduplicationConfig,
    /// Age thresholds for the retention sweeper.
    pub retention: RetentionConfig,
    /// Configuration for the operational HTTP endpoints.
    pub ops: OpsConfig,
}

/// Configuration for the notification store.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Maximum connections held by the pool.
    pub max_connections: u32,
}

/// Configuration for the realtime WebSocket listener.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RealtimeConfig {
    /// The address the WebSocket listener binds to.
    pub listen_addr: String,
}

/// Configuration for push delivery.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PushConfig {
    /// Whether push delivery is attempted at all.
    pub enabled: bool,
    /// Seconds a relay may hold an undelivered push before dropping it.
    pub ttl_seconds: u32,
    /// Per-request timeout towards a subscription endpoint, in seconds.
    pub timeout_seconds: u64,
}

/// Cadences for the periodic jobs, in seconds.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SchedulerConfig {
    pub equipment_scan_seconds: u64,
    pub maintenance_scan_seconds: u64,
    pub service_order_scan_seconds: u64,
    pub retention_sweep_seconds: u64,
}

/// Configuration for the anti-storm window.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeduplicationConfig {
    /// The size of the suppression cache.
    pub cache_size: usize,
    /// The rolling window within which a `(kind, related_id)` pair is
    /// notified at most once, in seconds.
    pub window_seconds: u64,
}

/// Age thresholds for the retention sweeper, in days.
///
/// Unread notifications are kept longer than read ones on the assumption
/// the user has not seen them yet, but are still eventually pruned to bound
/// storage growth.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetentionConfig {
    pub read_max_days: i64,
    pub unread_max_days: i64,
    pub subscription_max_days: i64,
}

/// Configuration for the operational HTTP endpoints.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpsConfig {
    /// Whether to serve `/metrics` and `/stats`.
    pub enabled: bool,
    /// The address the ops server binds to.
    pub listen_addr: String,
}

impl Config {
    /// Loads the application configuration by layering sources: defaults,
    /// the TOML file, `MAINTWATCH_`-prefixed environment variables, and
    /// command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| "maintwatch.toml".into());
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // Allow overriding with environment variables, e.g., MAINTWATCH_LOG_LEVEL=debug
            .merge(Env::prefixed("MAINTWATCH_"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            store: StoreConfig {
                database_url: "postgres://localhost/maintwatch".to_string(),
                max_connections: 10,
            },
            realtime: RealtimeConfig {
                listen_addr: "127.0.0.1:8090".to_string(),
            },
            push: PushConfig {
                enabled: true,
                ttl_seconds: 86_400,
                timeout_seconds: 10,
            },
            scheduler: SchedulerConfig {
                equipment_scan_seconds: 300,
                maintenance_scan_seconds: 3_600,
                service_order_scan_seconds: 600,
                retention_sweep_seconds: 86_400,
            },
            deduplication: DeduplicationConfig {
                cache_size: 10_000,
                window_seconds: 3_600,
            },
            retention: RetentionConfig {
                read_max_days: 30,
                unread_max_days: 90,
                subscription_max_days: 60,
            },
            ops: OpsConfig {
                enabled: true,
                listen_addr: "127.0.0.1:9095".to_string(),
            },
        }
    }
}
