use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::RouteError;
use crate::store::{WaypointSnapshot, WaypointStore};
use crate::types::Coordinate;

/// A computed route as returned by a routing backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Route {
    pub path: Vec<Coordinate>,
    /// Metres.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
}

/// Anything that can turn an ordered waypoint list into a driving route.
///
/// The returned future must not borrow `self` because it is awaited on a
/// separate task. Requests may reach the backend in any order once spawned.
pub trait RoutingBackend: Send + Sync {
    fn route(&self, waypoints: WaypointSnapshot) -> BoxFuture<'static, Result<Route, RouteError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutePhase {
    #[default]
    Empty,
    Pending,
    Populated,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RouteState {
    pub path: Vec<Coordinate>,
    pub distance: f64,
    pub duration: f64,
    pub phase: RoutePhase,
    /// Set when the latest request failed, cleared by the next issue or success.
    pub unavailable: bool,
    /// Generation of the most recently issued request.
    pub issued: u64,
    /// Generation whose response produced `path`.
    pub applied: u64,
}

/// Keeps the published route in step with the waypoint sequence.
///
/// Each request is tagged with a generation; a response is applied only if no
/// newer request was issued in the meantime.
pub struct RouteSynchronizer {
    backend: Arc<dyn RoutingBackend>,
    state: Arc<watch::Sender<RouteState>>,
}

impl RouteSynchronizer {
    pub fn new(backend: Arc<dyn RoutingBackend>) -> Self {
        let (state, _) = watch::channel(RouteState::default());
        Self {
            backend,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> RouteState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RouteState> {
        self.state.subscribe()
    }

    /// Issues a route request for `waypoints`. Sequences shorter than two
    /// waypoints are ignored and leave the current route untouched.
    pub fn request(&self, waypoints: WaypointSnapshot) -> Option<JoinHandle<()>> {
        if waypoints.len() < 2 {
            trace!("Skipping route request for {} waypoint(s)", waypoints.len());
            return None;
        }

        let mut generation = 0;
        self.state.send_modify(|state| {
            state.issued += 1;
            state.phase = RoutePhase::Pending;
            state.unavailable = false;
            generation = state.issued;
        });
        debug!(generation, waypoints = waypoints.len(), "Issuing route request");

        // a panicking backend still has to settle this generation
        let backend = Arc::clone(&self.backend);
        let response = panic::catch_unwind(AssertUnwindSafe(move || backend.route(waypoints)))
            .unwrap_or_else(|_| future::ready(Err(RouteError::Panicked)).boxed());
        let state = Arc::clone(&self.state);
        Some(tokio::spawn(async move {
            let result = AssertUnwindSafe(response)
                .catch_unwind()
                .await
                .unwrap_or(Err(RouteError::Panicked));
            apply(&state, generation, result);
        }))
    }

    /// Requests a route for every snapshot published on `waypoints` until the
    /// store goes away.
    pub async fn run(&self, mut waypoints: watch::Receiver<WaypointSnapshot>) {
        while waypoints.changed().await.is_ok() {
            let snapshot = waypoints.borrow_and_update().clone();
            self.request(snapshot);
        }
        debug!("Waypoint store dropped, stopping route synchronizer");
    }

    pub fn spawn(self: &Arc<Self>, store: &WaypointStore) -> JoinHandle<()> {
        let waypoints = store.subscribe();
        let synchronizer = Arc::clone(self);
        tokio::spawn(async move { synchronizer.run(waypoints).await })
    }
}

fn apply(state: &watch::Sender<RouteState>, generation: u64, result: Result<Route, RouteError>) {
    state.send_if_modified(|state| {
        if state.issued != generation {
            debug!(
                generation,
                latest = state.issued,
                "Discarding stale route response"
            );
            return false;
        }

        match result {
            Ok(route) => {
                debug!(generation, points = route.path.len(), "Applying route");
                state.path = route.path;
                state.distance = route.distance;
                state.duration = route.duration;
                state.phase = RoutePhase::Populated;
                state.unavailable = false;
                state.applied = generation;
            }
            Err(err) => {
                warn!(generation, "Routing failed: {}", err);
                state.phase = if state.applied == 0 {
                    RoutePhase::Empty
                } else {
                    RoutePhase::Populated
                };
                state.unavailable = true;
            }
        }
        true
    });
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::Waypoint;
    use futures::FutureExt;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Reply = Result<Route, RouteError>;

    /// Answers requests in issue order with replies the test releases.
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        replies: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
        pub(crate) calls: Mutex<Vec<WaypointSnapshot>>,
    }

    impl ScriptedBackend {
        pub(crate) fn expect(&self) -> oneshot::Sender<Reply> {
            let (sender, receiver) = oneshot::channel();
            self.replies.lock().unwrap().push_back(receiver);
            sender
        }

        pub(crate) fn respond(&self, reply: Reply) {
            let _ = self.expect().send(reply);
        }
    }

    impl RoutingBackend for ScriptedBackend {
        fn route(&self, waypoints: WaypointSnapshot) -> BoxFuture<'static, Reply> {
            self.calls.lock().unwrap().push(waypoints);
            let reply = self.replies.lock().unwrap().pop_front();
            async move {
                match reply {
                    Some(receiver) => receiver.await.unwrap_or(Err(RouteError::NoRoute)),
                    None => Err(RouteError::NoRoute),
                }
            }
            .boxed()
        }
    }

    pub(crate) fn route(path: &[Coordinate]) -> Route {
        Route {
            path: path.to_vec(),
            distance: 1200.0,
            duration: 90.0,
        }
    }

    fn waypoints(points: &[(f64, f64)]) -> WaypointSnapshot {
        Arc::new(points.iter().map(|&(lat, lng)| Waypoint::new(lat, lng)).collect())
    }

    fn setup() -> (Arc<ScriptedBackend>, RouteSynchronizer) {
        let backend = Arc::new(ScriptedBackend::default());
        let synchronizer = RouteSynchronizer::new(backend.clone());
        (backend, synchronizer)
    }

    #[tokio::test]
    async fn test_short_sequences_issue_no_request() {
        let (backend, synchronizer) = setup();

        assert!(synchronizer.request(waypoints(&[])).is_none());
        assert!(synchronizer.request(waypoints(&[(1.0, 1.0)])).is_none());

        assert!(backend.calls.lock().unwrap().is_empty());
        assert_eq!(synchronizer.state(), RouteState::default());
    }

    #[tokio::test]
    async fn test_short_sequence_keeps_previous_route() {
        let (backend, synchronizer) = setup();
        backend.respond(Ok(route(&[(1.0, 2.0), (1.1, 2.1)])));
        synchronizer
            .request(waypoints(&[(1.0, 2.0), (1.1, 2.1)]))
            .unwrap()
            .await
            .unwrap();
        let before = synchronizer.state();

        assert!(synchronizer.request(waypoints(&[(1.0, 2.0)])).is_none());

        assert_eq!(synchronizer.state(), before);
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_success_publishes_path() {
        let (backend, synchronizer) = setup();
        backend.respond(Ok(route(&[(1.0, 2.0), (1.1, 2.1)])));
        let sent = waypoints(&[(1.0, 2.0), (1.1, 2.1)]);

        let handle = synchronizer.request(sent.clone()).unwrap();
        assert_eq!(synchronizer.state().phase, RoutePhase::Pending);
        handle.await.unwrap();

        let state = synchronizer.state();
        assert_eq!(state.path, vec![(1.0, 2.0), (1.1, 2.1)]);
        assert_eq!(state.phase, RoutePhase::Populated);
        assert_eq!(state.distance, 1200.0);
        assert_eq!(state.duration, 90.0);
        assert_eq!((state.issued, state.applied), (1, 1));
        assert!(Arc::ptr_eq(&backend.calls.lock().unwrap()[0], &sent));
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_path() {
        let (backend, synchronizer) = setup();
        backend.respond(Ok(route(&[(1.0, 2.0), (1.1, 2.1)])));
        backend.respond(Err(RouteError::NoRoute));

        let first = waypoints(&[(1.0, 2.0), (1.1, 2.1)]);
        synchronizer.request(first).unwrap().await.unwrap();
        let second = waypoints(&[(1.0, 2.0), (1.5, 2.5)]);
        synchronizer.request(second).unwrap().await.unwrap();

        let state = synchronizer.state();
        assert_eq!(state.path, vec![(1.0, 2.0), (1.1, 2.1)]);
        assert_eq!(state.phase, RoutePhase::Populated);
        assert!(state.unavailable);
        assert_eq!((state.issued, state.applied), (2, 1));
    }

    #[tokio::test]
    async fn test_failure_without_route_falls_back_to_empty() {
        let (backend, synchronizer) = setup();
        backend.respond(Err(RouteError::TooFewWaypoints(0)));

        synchronizer
            .request(waypoints(&[(1.0, 2.0), (1.1, 2.1)]))
            .unwrap()
            .await
            .unwrap();

        let state = synchronizer.state();
        assert_eq!(state.phase, RoutePhase::Empty);
        assert!(state.path.is_empty());
        assert!(state.unavailable);
    }

    #[tokio::test]
    async fn test_success_clears_unavailable() {
        let (backend, synchronizer) = setup();
        backend.respond(Err(RouteError::NoRoute));
        backend.respond(Ok(route(&[(3.0, 4.0), (3.1, 4.1)])));
        let sent = waypoints(&[(3.0, 4.0), (3.1, 4.1)]);

        synchronizer.request(sent.clone()).unwrap().await.unwrap();
        assert!(synchronizer.state().unavailable);
        synchronizer.request(sent).unwrap().await.unwrap();

        let state = synchronizer.state();
        assert!(!state.unavailable);
        assert_eq!(state.phase, RoutePhase::Populated);
    }

    #[tokio::test]
    async fn test_latest_issued_wins_over_latest_resolved() {
        let (backend, synchronizer) = setup();
        let first_reply = backend.expect();
        let second_reply = backend.expect();

        let first = synchronizer
            .request(waypoints(&[(1.0, 1.0), (2.0, 2.0)]))
            .unwrap();
        let second = synchronizer
            .request(waypoints(&[(1.0, 1.0), (3.0, 3.0)]))
            .unwrap();

        second_reply
            .send(Ok(route(&[(1.0, 1.0), (3.0, 3.0)])))
            .unwrap();
        second.await.unwrap();
        first_reply
            .send(Ok(route(&[(1.0, 1.0), (2.0, 2.0)])))
            .unwrap();
        first.await.unwrap();

        let state = synchronizer.state();
        assert_eq!(state.path, vec![(1.0, 1.0), (3.0, 3.0)]);
        assert_eq!((state.issued, state.applied), (2, 2));
    }

    struct PanickingBackend {
        eager: bool,
    }

    impl RoutingBackend for PanickingBackend {
        fn route(&self, _: WaypointSnapshot) -> BoxFuture<'static, Reply> {
            if self.eager {
                panic!("backend failed while building the request");
            }
            future::lazy(|_| -> Reply { panic!("backend failed while awaiting the response") })
                .boxed()
        }
    }

    #[tokio::test]
    async fn test_panicking_backend_settles_as_failure() {
        for eager in [false, true] {
            let synchronizer = RouteSynchronizer::new(Arc::new(PanickingBackend { eager }));

            synchronizer
                .request(waypoints(&[(1.0, 2.0), (1.1, 2.1)]))
                .unwrap()
                .await
                .unwrap();

            let state = synchronizer.state();
            assert_eq!(state.phase, RoutePhase::Empty);
            assert!(state.unavailable);
            assert_eq!((state.issued, state.applied), (1, 0));
        }
    }

    #[tokio::test]
    async fn test_stale_failure_is_discarded() {
        let (backend, synchronizer) = setup();
        let first_reply = backend.expect();
        backend.respond(Ok(route(&[(5.0, 5.0), (6.0, 6.0)])));

        let first = synchronizer
            .request(waypoints(&[(5.0, 5.0), (7.0, 7.0)]))
            .unwrap();
        synchronizer
            .request(waypoints(&[(5.0, 5.0), (6.0, 6.0)]))
            .unwrap()
            .await
            .unwrap();
        first_reply.send(Err(RouteError::NoRoute)).unwrap();
        first.await.unwrap();

        let state = synchronizer.state();
        assert!(!state.unavailable);
        assert_eq!(state.path, vec![(5.0, 5.0), (6.0, 6.0)]);
    }

    #[tokio::test]
    async fn test_follows_store_changes() {
        let store = WaypointStore::new();
        let (backend, synchronizer) = setup();
        let synchronizer = Arc::new(synchronizer);
        backend.respond(Ok(route(&[(1.0, 2.0), (1.1, 2.1)])));
        let mut route_state = synchronizer.subscribe();
        synchronizer.spawn(&store);

        store.append(Waypoint::new(1.0, 2.0));
        store.append(Waypoint::new(1.1, 2.1));

        let state = tokio::time::timeout(
            Duration::from_secs(1),
            route_state.wait_for(|state| state.phase == RoutePhase::Populated),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(state.path, vec![(1.0, 2.0), (1.1, 2.1)]);
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            *calls[0],
            vec![Waypoint::new(1.0, 2.0), Waypoint::new(1.1, 2.1)]
        );
    }
}
