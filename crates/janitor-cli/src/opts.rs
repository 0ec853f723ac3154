//! Command-line and environment options

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, ValueEnum};
use miette::{Result, miette};

#[derive(Parser, Debug)]
#[command(name = "kube-janitor")]
#[command(version)]
#[command(about = "Periodic Kubernetes resource reaper", long_about = None)]
pub struct Opts {
    /// Janitor interval between runs
    #[arg(long, env = "JANITOR_INTERVAL", default_value = "1h", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Path to the janitor configuration file
    #[arg(long, env = "JANITOR_CONFIG")]
    pub config: PathBuf,

    /// Dry run (no delete)
    #[arg(long = "dry-run", env = "JANITOR_DRYRUN")]
    pub dry_run: bool,

    /// Run once and exit
    #[arg(long, env = "JANITOR_ONCE")]
    pub once: bool,

    /// Kubernetes config path (should be empty if in-cluster)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// How many items per page the janitor should process
    #[arg(long = "kube.itemsperpage", env = "KUBE_ITEMSPERPAGE", default_value_t = 100)]
    pub kube_items_per_page: u32,

    #[command(flatten)]
    pub server: ServerOpts,

    #[command(flatten)]
    pub log: LogOpts,
}

#[derive(Args, Debug)]
pub struct ServerOpts {
    /// Server address
    #[arg(long = "server.bind", env = "SERVER_BIND", default_value = ":8080")]
    pub bind: String,

    /// Server read timeout
    #[arg(long = "server.timeout.read", env = "SERVER_TIMEOUT_READ", default_value = "5s", value_parser = humantime::parse_duration)]
    pub read_timeout: Duration,

    /// Server write timeout
    #[arg(long = "server.timeout.write", env = "SERVER_TIMEOUT_WRITE", default_value = "10s", value_parser = humantime::parse_duration)]
    pub write_timeout: Duration,
}

impl ServerOpts {
    /// The bind address as a socket address. A bare `:port` binds all
    /// interfaces.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let candidate = if self.bind.starts_with(':') {
            format!("0.0.0.0{}", self.bind)
        } else {
            self.bind.clone()
        };
        candidate
            .parse()
            .map_err(|err| miette!("invalid server bind address '{}': {err}", self.bind))
    }
}

#[derive(Args, Debug)]
pub struct LogOpts {
    /// Log level
    #[arg(long = "log.level", env = "LOG_LEVEL", value_enum, default_value = "info")]
    pub level: LogLevel,

    /// Log format
    #[arg(long = "log.format", env = "LOG_FORMAT", value_enum, default_value = "logfmt")]
    pub format: LogFormat,

    /// Show source for every log message
    #[arg(long = "log.source", env = "LOG_SOURCE")]
    pub source: bool,

    /// Enable color for logs
    #[arg(long = "log.color", env = "LOG_COLOR", value_enum, default_value = "auto")]
    pub color: LogColor,

    /// Show log time
    #[arg(long = "log.time", env = "LOG_TIME")]
    pub time: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Logfmt,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogColor {
    Auto,
    Yes,
    No,
}
