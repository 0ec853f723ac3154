//! Janitor Core - cluster-independent primitives for kube-janitor
//!
//! This crate provides:
//! - **Configuration**: the declarative model (TTL shortcut + rules), loaded
//!   strictly from YAML and validated at startup
//! - **Expiry**: TTL token parsing (unix seconds, durations, timestamps) and
//!   the expiry decision against a reference time
//! - **Selectors**: formatting of Kubernetes label selectors into their
//!   server-side string form
//! - **Paths**: JMESPath expressions compiled at load time, used for skip
//!   filtering and alternate timestamp extraction

pub mod config;
pub mod error;
pub mod expiry;
pub mod path;
pub mod selector;

pub use config::{Config, DeleteOptions, PropagationPolicy, ResourceSpec, Rule, TtlConfig};
pub use error::{ConfigError, ExpiryError, PathError, Result, SelectorError};
pub use expiry::{Expiry, check_expiry, parse_timestamp};
pub use path::PathExpr;
pub use selector::Selector;
