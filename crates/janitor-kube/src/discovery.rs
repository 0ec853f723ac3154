//! Server API discovery cache
//!
//! Enumerates every API group at its preferred version and keeps the kinds
//! whose advertised verbs cover get, list, and delete. The catalog is
//! immutable for the duration of a run and cached across runs for one hour.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::Client;
use kube::discovery::{Discovery, Scope, verbs};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{JanitorError, Result};

/// How long a fetched catalog stays valid.
pub const DISCOVERY_CACHE_TTL: Duration = Duration::from_secs(3600);

/// One reapable kind from server discovery, pinned to the preferred version
/// of its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEntry {
    pub group: String,
    pub version: String,
    /// Server-side resource name (plural), e.g. `deployments`.
    pub resource: String,
    /// CamelCase kind, e.g. `Deployment`.
    pub kind: String,
    pub namespaced: bool,
}

struct CacheSlot {
    fetched_at: Instant,
    entries: Arc<Vec<ApiEntry>>,
}

/// TTL cache around server discovery. A single writer refreshes the slot,
/// any number of readers within a run share the fetched catalog.
pub struct DiscoveryCache {
    ttl: Duration,
    slot: RwLock<Option<CacheSlot>>,
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(DISCOVERY_CACHE_TTL)
    }
}

impl DiscoveryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// The current catalog, fetching it from the server when the cached one
    /// is missing or stale.
    pub async fn entries(&self, client: &Client) -> Result<Arc<Vec<ApiEntry>>> {
        if let Some(slot) = &*self.slot.read().await {
            if slot.fetched_at.elapsed() < self.ttl {
                return Ok(slot.entries.clone());
            }
        }

        let mut guard = self.slot.write().await;
        // another task may have refreshed while we waited for the lock
        if let Some(slot) = &*guard {
            if slot.fetched_at.elapsed() < self.ttl {
                return Ok(slot.entries.clone());
            }
        }

        let entries = Arc::new(fetch_server_resources(client).await?);
        debug!(kinds = entries.len(), "discovered reapable server resources");
        *guard = Some(CacheSlot {
            fetched_at: Instant::now(),
            entries: entries.clone(),
        });
        Ok(entries)
    }

    /// Drop the cached catalog so the next run fetches a fresh one.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

/// Ask the server for its groups and keep every resource of each group's
/// preferred version that supports get+list+delete. Subresources never
/// advertise all three, so they fall out naturally.
async fn fetch_server_resources(client: &Client) -> Result<Vec<ApiEntry>> {
    let discovery = Discovery::new(client.clone())
        .run()
        .await
        .map_err(JanitorError::Discovery)?;

    let mut entries = Vec::new();
    for group in discovery.groups() {
        let version = group.preferred_version_or_latest();
        for (resource, capabilities) in group.versioned_resources(version) {
            if !capabilities.supports_operation(verbs::GET)
                || !capabilities.supports_operation(verbs::LIST)
                || !capabilities.supports_operation(verbs::DELETE)
            {
                continue;
            }
            entries.push(ApiEntry {
                group: resource.group,
                version: resource.version,
                resource: resource.plural,
                kind: resource.kind,
                namespaced: capabilities.scope == Scope::Namespaced,
            });
        }
    }

    Ok(entries)
}
