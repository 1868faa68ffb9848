use std::sync::Arc;

use crate::store::{WaypointSnapshot, WaypointStore};
use crate::sync::{RouteState, RouteSynchronizer, RoutingBackend};
use crate::types::Waypoint;

/// Editor state shared by the HTTP handlers: the waypoint store plus the
/// synchronizer that follows it.
pub struct MapEditor {
    store: WaypointStore,
    synchronizer: Arc<RouteSynchronizer>,
}

impl MapEditor {
    /// Must be called from within a tokio runtime. The subscription task ends
    /// once the editor (and with it the store) is dropped.
    pub fn new(backend: Arc<dyn RoutingBackend>) -> Self {
        let store = WaypointStore::new();
        let synchronizer = Arc::new(RouteSynchronizer::new(backend));
        synchronizer.spawn(&store);
        Self { store, synchronizer }
    }

    pub fn click(&self, point: Waypoint) {
        self.store.append(point);
    }

    pub fn drag_end(&self, prior: Waypoint, next: Waypoint) -> usize {
        self.store.replace_by_value(prior, next)
    }

    pub fn remove(&self, index: usize) -> Option<Waypoint> {
        self.store.remove_at(index)
    }

    pub fn waypoints(&self) -> WaypointSnapshot {
        self.store.snapshot()
    }

    pub fn route(&self) -> RouteState {
        self.synchronizer.state()
    }

    pub fn synchronizer(&self) -> &Arc<RouteSynchronizer> {
        &self.synchronizer
    }
}
