use crate::entities::{RouteMetrics, SavedRoute, Waypoint};

/// The committed route currently on display, distinct from any draft
/// under construction. Holds the resolved waypoints plus the metrics the
/// mapping collaborator computed for them. A cached copy; staleness is
/// acceptable and fixed by re-fetching on navigation.
#[derive(Debug, Default)]
pub struct SavedRouteStore {
    current: Option<SavedRoute>,
    metrics: Option<RouteMetrics>,
}

/// The view the map-drawing collaborator consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayRoute {
    pub name: String,
    pub origin: Waypoint,
    pub destination: Waypoint,
    pub stops: Vec<Waypoint>,
}

impl SavedRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the displayed route. Metrics belong to the previous route,
    /// so they are dropped until the collaborator recomputes them.
    pub fn load(&mut self, route: SavedRoute) {
        self.current = Some(route);
        self.metrics = None;
    }

    pub fn current(&self) -> Option<&SavedRoute> {
        self.current.as_ref()
    }

    pub fn set_metrics(&mut self, metrics: RouteMetrics) {
        self.metrics = Some(metrics);
    }

    pub fn metrics(&self) -> Option<&RouteMetrics> {
        self.metrics.as_ref()
    }

    pub fn display_route(&self) -> Option<DisplayRoute> {
        self.current.as_ref().map(|route| DisplayRoute {
            name: route.name.clone(),
            origin: route.origin.clone(),
            destination: route.destination.clone(),
            stops: route.stops.clone(),
        })
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.metrics = None;
    }
}

#[test]
fn loading_a_route_drops_stale_metrics() {
    use crate::entities::PhotoRef;
    use chrono::Utc;

    let waypoint = |name: &str| Waypoint {
        id: name.into(),
        name: name.into(),
        address: None,
        lat: 1.0,
        lng: 2.0,
    };
    let route = |id: &str| SavedRoute {
        id: id.into(),
        name: "Coast trip".into(),
        creator_id: "kai@example.com".into(),
        origin: waypoint("a"),
        destination: waypoint("b"),
        stops: vec![waypoint("c")],
        photos: vec![PhotoRef {
            filename: "one.jpg".into(),
            url: "https://cdn.example.com/one.jpg".into(),
        }],
        created_at: Utc::now(),
    };

    let mut store = SavedRouteStore::new();
    store.load(route("r1"));
    store.set_metrics(RouteMetrics {
        distance: "12 km".into(),
        duration: "18 min".into(),
    });
    assert!(store.metrics().is_some());

    store.load(route("r2"));
    assert!(store.metrics().is_none());
    assert_eq!(store.display_route().unwrap().stops.len(), 1);

    store.clear();
    assert!(store.current().is_none());
}
