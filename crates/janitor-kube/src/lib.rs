//! Janitor Kube - the cluster-facing reaping engine
//!
//! This crate provides:
//! - **Discovery cache**: listable+deletable kinds per API group, pinned to
//!   each group's preferred version
//! - **Wildcard resolver**: expansion of `*` in configured resources against
//!   the discovery catalog
//! - **Walkers**: paged streaming over namespaces and dynamic resources
//! - **Evaluator + rule runner**: the per-object expiry decision and the
//!   namespace x resource traversal driving it
//! - **Engine driver**: one `run()` covering the TTL shortcut and every
//!   configured rule, publishing the pending-expiry gauges at the end
//! - **Metrics & events**: the Prometheus surface and the audit Event
//!   emitted for every deletion

pub mod discovery;
pub mod engine;
pub mod error;
mod evaluate;
pub mod events;
pub mod metrics;
pub mod resolve;
mod runner;
pub mod walker;

#[cfg(test)]
mod mock_tests;

pub use discovery::{ApiEntry, DiscoveryCache};
pub use engine::{Janitor, TTL_RULE_ID};
pub use error::{JanitorError, Result};
pub use metrics::{DeletionLabels, ExpiryLabels, ExpirySnapshot, JanitorMetrics};
pub use resolve::expand_resources;
