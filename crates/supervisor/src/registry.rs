//! In-process registry of live workers.
//!
//! The registry is the supervisor's source of truth for "is a worker running
//! for this tenant". It holds only transient, process-lifetime state and is
//! rebuilt empty when the supervisor restarts; workers spawned by a previous
//! supervisor instance are orphaned and need external reconciliation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

/// Observed state of a registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Running,
    Stopped,
    Error,
}

/// A live worker registered for a tenant.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub tenant_id: String,
    pub instance_id: String,
    pub pid: u32,
    pub state: WorkerState,
    pub started_at: DateTime<Utc>,
    /// Signals the worker's event task to begin termination.
    pub(crate) stop_tx: mpsc::Sender<()>,
}

/// Concurrency-safe map of tenant id to worker handle.
///
/// Owned by a single `ProcessSupervisor` instance and injected where needed,
/// never a module-level singleton, so tests can run supervisors side by side.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: DashMap<String, WorkerHandle>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, handle: WorkerHandle) {
        self.workers.insert(handle.tenant_id.clone(), handle);
    }

    pub fn get(&self, tenant_id: &str) -> Option<WorkerHandle> {
        self.workers.get(tenant_id).map(|h| h.clone())
    }

    pub fn remove(&self, tenant_id: &str) -> Option<WorkerHandle> {
        self.workers.remove(tenant_id).map(|(_, h)| h)
    }

    /// Remove the tenant's handle only if it still belongs to the given
    /// instance. A replacement worker's handle is left untouched.
    pub fn remove_instance(&self, tenant_id: &str, instance_id: &str) -> Option<WorkerHandle> {
        self.workers
            .remove_if(tenant_id, |_, h| h.instance_id == instance_id)
            .map(|(_, h)| h)
    }

    pub fn list_all(&self) -> Vec<WorkerHandle> {
        self.workers.iter().map(|e| e.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
