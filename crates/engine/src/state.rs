//! Ambient daemon state -- shared between the context builder and renderers
//!
//! Three pieces of process-wide state exist: the latest daemon info, the
//! server version probed at startup, and the swarm services map. Only the
//! context builder writes them; renderers and context snapshots read them.
//! Staleness across regenerations is acceptable, torn reads are not, so
//! every access goes through the locks here.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use topogen_core::context::{DaemonInfo, DaemonVersion, Services};

/// Shared daemon state. Cheap to clone handles of via `Arc`.
#[derive(Debug, Default)]
pub struct DaemonState {
    info: RwLock<Option<DaemonInfo>>,
    version: RwLock<Option<DaemonVersion>>,
    services: RwLock<Arc<Services>>,
}

// A panicked writer cannot leave these maps half-updated (writes are single
// assignments), so lock poisoning is recovered rather than propagated.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DaemonState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest daemon info, if any probe has succeeded yet.
    pub fn info(&self) -> Option<DaemonInfo> {
        read(&self.info).clone()
    }

    pub fn set_info(&self, info: DaemonInfo) {
        *write(&self.info) = Some(info);
    }

    /// Server version probed at startup, if the probe succeeded.
    pub fn version(&self) -> Option<DaemonVersion> {
        read(&self.version).clone()
    }

    pub fn set_version(&self, version: DaemonVersion) {
        *write(&self.version) = Some(version);
    }

    /// Current services map. Possibly stale when the last refresh failed.
    pub fn services(&self) -> Arc<Services> {
        Arc::clone(&read(&self.services))
    }

    pub fn set_services(&self, services: Services) {
        *write(&self.services) = Arc::new(services);
    }
}
