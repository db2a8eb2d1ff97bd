//! Daemon configuration
//!
//! Settings come from three layers: built-in defaults, an optional TOML
//! file, and command-line flags. Each layer overrides the one before it.
//!
//! Example file:
//!
//! ```toml
//! interface = "eth1"
//! reject = ["10.0.0.0/8", "192.168.1.1"]
//! quiet_period_secs = 600
//! ```

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use ripsync_common::{RipsyncError, RipsyncResult};
use serde::Deserialize;

use crate::commands::Platform;
use crate::filter::RejectFilter;
use crate::reconciler::ReconcilerConfig;
use crate::types::{
    RejectRule, DEFAULT_CHECK_INTERVAL, DEFAULT_INTERFACE, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_QUIET_PERIOD, RIP_MULTICAST_GROUP, RIP_PORT,
};

/// Command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "ripsyncd")]
#[command(version, about = "Mirror RIP-v2 advertised routes into the kernel routing table", long_about = None)]
pub struct Args {
    /// Egress interface for installed routes and the multicast join [default: eth0]
    #[arg(short = 'i', long)]
    pub interface: Option<String>,

    /// UDP service port [default: 520]
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Listen address [default: 0.0.0.0]
    #[arg(short = 'l', long)]
    pub listen: Option<Ipv4Addr>,

    /// Routes to reject, separated by ';' (e.g. "10.0.0.0/8;192.168.1.1")
    #[arg(short = 'r', long)]
    pub reject: Option<String>,

    /// Route command syntax: linux or darwin [default: build target]
    #[arg(long)]
    pub platform: Option<String>,

    /// Seconds between expiry checks [default: 180]
    #[arg(long, value_name = "SECS")]
    pub check_interval: Option<u64>,

    /// Seconds without advertisements before routes are withdrawn [default: 300]
    #[arg(long, value_name = "SECS")]
    pub quiet_period: Option<u64>,

    /// Capacity of the receive queue [default: 64]
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Give up on a route command after this many seconds [default: wait forever]
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,

    /// TOML configuration file
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Contents of the TOML configuration file
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub interface: Option<String>,
    pub port: Option<u16>,
    pub listen: Option<Ipv4Addr>,
    pub reject: Vec<RejectRule>,
    pub platform: Option<String>,
    pub check_interval_secs: Option<u64>,
    pub quiet_period_secs: Option<u64>,
    pub queue_capacity: Option<usize>,
    pub command_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Read and parse a configuration file
    pub fn load(path: &Path) -> RipsyncResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            RipsyncError::invalid_config("config", format!("{}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Parse configuration file text
    pub fn parse(text: &str) -> RipsyncResult<Self> {
        toml::from_str(text).map_err(|e| RipsyncError::invalid_config("config", e.to_string()))
    }
}

/// Fully resolved daemon settings
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub interface: String,
    pub port: u16,
    pub listen: Ipv4Addr,
    pub group: Ipv4Addr,
    pub filter: RejectFilter,
    pub platform: Platform,
    pub check_interval: Duration,
    pub quiet_period: Duration,
    pub queue_capacity: usize,
    pub command_timeout: Option<Duration>,
}

impl DaemonConfig {
    /// Resolve settings from arguments, reading `--config` if given
    pub fn load(args: &Args) -> RipsyncResult<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    /// Merge defaults, file and arguments, then validate
    pub fn resolve(args: &Args, file: FileConfig) -> RipsyncResult<Self> {
        let filter = match &args.reject {
            Some(list) => RejectFilter::parse(list)?,
            None => RejectFilter::new(file.reject),
        };

        let platform = match args.platform.as_deref().or(file.platform.as_deref()) {
            Some(name) => name.parse()?,
            None => Platform::current()?,
        };

        let secs = |cli: Option<u64>, file: Option<u64>| cli.or(file).map(Duration::from_secs);

        let config = Self {
            interface: args
                .interface
                .clone()
                .or(file.interface)
                .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            port: args.port.or(file.port).unwrap_or(RIP_PORT),
            listen: args.listen.or(file.listen).unwrap_or(Ipv4Addr::UNSPECIFIED),
            group: RIP_MULTICAST_GROUP,
            filter,
            platform,
            check_interval: secs(args.check_interval, file.check_interval_secs)
                .unwrap_or(DEFAULT_CHECK_INTERVAL),
            quiet_period: secs(args.quiet_period, file.quiet_period_secs)
                .unwrap_or(DEFAULT_QUIET_PERIOD),
            queue_capacity: args
                .queue_capacity
                .or(file.queue_capacity)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            command_timeout: secs(args.command_timeout, file.command_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> RipsyncResult<()> {
        if self.interface.trim().is_empty() {
            return Err(RipsyncError::invalid_config("interface", "must not be empty"));
        }
        if self.check_interval.is_zero() {
            return Err(RipsyncError::invalid_config("check_interval", "must be positive"));
        }
        if self.quiet_period.is_zero() {
            return Err(RipsyncError::invalid_config("quiet_period", "must be positive"));
        }
        if self.queue_capacity == 0 {
            return Err(RipsyncError::invalid_config("queue_capacity", "must be positive"));
        }
        if self.command_timeout.is_some_and(|t| t.is_zero()) {
            return Err(RipsyncError::invalid_config("command_timeout", "must be positive"));
        }
        Ok(())
    }

    /// Settings for the reconciler
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig::new(self.interface.clone(), self.platform)
            .with_filter(self.filter.clone())
            .with_timers(self.check_interval, self.quiet_period)
    }
}
