//! Replaces the source's ambient `current_app` lookups (Flask's
//! request-global config/db/logger) with one value threaded explicitly
//! into every task and reconciler entry point.
//!
//! `feerecon-core` has no dependency on the storage crate, so this is
//! generic over the store implementation rather than naming a concrete
//! type; `feerecon-tasks`/`feerecon-reconcile` instantiate it with
//! `feerecon_storage::Store`.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Settings;
use crate::ports::{CfsClient, EventBus, ObjectStore};

#[derive(Clone)]
pub struct TaskContext<S> {
    pub settings: Arc<Settings>,
    pub clock: Arc<dyn Clock>,
    pub cfs_client: Arc<dyn CfsClient>,
    pub bus: Arc<dyn EventBus>,
    pub object_store: Arc<dyn ObjectStore>,
    pub store: S,
}

impl<S> TaskContext<S> {
    pub fn new(
        settings: Arc<Settings>,
        clock: Arc<dyn Clock>,
        cfs_client: Arc<dyn CfsClient>,
        bus: Arc<dyn EventBus>,
        object_store: Arc<dyn ObjectStore>,
        store: S,
    ) -> Self {
        Self {
            settings,
            clock,
            cfs_client,
            bus,
            object_store,
            store,
        }
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}
