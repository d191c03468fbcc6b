//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the service using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `maintwatch.toml` file and environment
//! variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// A real-time notification delivery service for maintenance operations.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address for the realtime WebSocket listener.
    #[arg(long, value_name = "ADDR")]
    pub listen_addr: Option<String>,

    /// Anti-storm suppression window in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub dedup_window: Option<u64>,

    /// Disable push delivery entirely.
    #[arg(long)]
    pub no_push: bool,

    /// Run one manual scan (equipment, maintenance, service-orders, all)
    /// and exit instead of starting the service.
    #[arg(long, value_name = "KIND")]
    pub check: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(addr) = &self.listen_addr {
            dict.insert("realtime.listen_addr".into(), Value::from(addr.clone()));
        }

        if let Some(window) = self.dedup_window {
            dict.insert("deduplication.window_seconds".into(), Value::from(window));
        }

        if self.no_push {
            dict.insert("push.enabled".into(), Value::from(false));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
