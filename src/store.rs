use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::types::Waypoint;

pub type WaypointSnapshot = Arc<Vec<Waypoint>>;

/// Owns the ordered waypoint sequence.
///
/// Every effective mutation publishes a fresh snapshot to subscribers. Order
/// is the visiting order of the route and only `remove_at` changes positions.
pub struct WaypointStore {
    waypoints: watch::Sender<WaypointSnapshot>,
}

impl Default for WaypointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WaypointStore {
    pub fn new() -> Self {
        let (waypoints, _) = watch::channel(Arc::new(Vec::new()));
        Self { waypoints }
    }

    pub fn subscribe(&self) -> watch::Receiver<WaypointSnapshot> {
        self.waypoints.subscribe()
    }

    pub fn snapshot(&self) -> WaypointSnapshot {
        self.waypoints.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.waypoints.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn append(&self, point: Waypoint) {
        self.waypoints.send_modify(|waypoints| {
            Arc::make_mut(waypoints).push(point);
            debug!("Appended waypoint {},{} ({} total)", point.lat, point.lng, waypoints.len());
        });
    }

    /// Replaces every waypoint equal to `old` with `new` and returns how many
    /// were replaced. Subscribers are only notified when something changed.
    pub fn replace_by_value(&self, old: Waypoint, new: Waypoint) -> usize {
        let mut replaced = 0;
        self.waypoints.send_if_modified(|waypoints| {
            if !waypoints.contains(&old) {
                return false;
            }
            for waypoint in Arc::make_mut(waypoints).iter_mut() {
                if *waypoint == old {
                    *waypoint = new;
                    replaced += 1;
                }
            }
            true
        });
        if replaced > 1 {
            debug!("Replaced {} waypoints sharing {},{}", replaced, old.lat, old.lng);
        }
        replaced
    }

    pub fn remove_at(&self, index: usize) -> Option<Waypoint> {
        let mut removed = None;
        self.waypoints.send_if_modified(|waypoints| {
            if index >= waypoints.len() {
                return false;
            }
            removed = Some(Arc::make_mut(waypoints).remove(index));
            true
        });
        removed
    }
}
