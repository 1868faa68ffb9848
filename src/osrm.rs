use futures::FutureExt;
use futures::future::BoxFuture;
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::RouteError;
use crate::polyline;
use crate::store::WaypointSnapshot;
use crate::sync::{Route, RoutingBackend};
use crate::types::Waypoint;

#[derive(Debug, Clone)]
pub struct RoutingOptions {
    pub base_url: String,
    pub cache_size: u64,
    pub timeout: Duration,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            base_url: String::from("http://127.0.0.1:5000"),
            cache_size: 128,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct OsrmResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct OsrmRoute {
    pub geometry: String,
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub duration: f64,
}

impl OsrmResponse {
    pub fn into_route(self) -> Result<Route, RouteError> {
        if let Some(code) = self.code {
            if code != "Ok" {
                return Err(RouteError::Backend {
                    code,
                    message: self.message.unwrap_or_default(),
                });
            }
        }

        let first = self.routes.into_iter().next().ok_or(RouteError::NoRoute)?;
        Ok(Route {
            path: polyline::decode(&first.geometry)?,
            distance: first.distance,
            duration: first.duration,
        })
    }
}

/// Driving-route client for an OSRM-compatible HTTP service.
pub struct OsrmClient {
    base_url: String,
    client: Client,
    cache: Option<Cache<String, Route>>,
}

impl OsrmClient {
    pub fn new(options: RoutingOptions) -> Result<Self, RouteError> {
        let client = Client::builder().timeout(options.timeout).build()?;
        let cache = (options.cache_size > 0).then(|| Cache::new(options.cache_size));
        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            client,
            cache,
        })
    }

    /// `lng,lat` pairs in visiting order, separated by `;`.
    pub fn waypoint_segment(waypoints: &[Waypoint]) -> String {
        waypoints
            .iter()
            .map(|point| format!("{},{}", point.lng, point.lat))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn route_url(&self, waypoints: &[Waypoint]) -> Result<String, RouteError> {
        if waypoints.len() < 2 {
            return Err(RouteError::TooFewWaypoints(waypoints.len()));
        }
        Ok(format!(
            "{}/route/v1/driving/{}?steps=true&overview=full",
            self.base_url,
            Self::waypoint_segment(waypoints)
        ))
    }

}

impl RoutingBackend for OsrmClient {
    fn route(&self, waypoints: WaypointSnapshot) -> BoxFuture<'static, Result<Route, RouteError>> {
        let url = self.route_url(&waypoints);
        let client = self.client.clone();
        let cache = self.cache.clone();
        async move { fetch(client, cache, url?).await }.boxed()
    }
}

#[instrument(level = "debug", skip_all, fields(url = %url))]
async fn fetch(
    client: Client,
    cache: Option<Cache<String, Route>>,
    url: String,
) -> Result<Route, RouteError> {
    if let Some(cache) = &cache {
        if let Some(route) = cache.get(&url).await {
            debug!("Route cache hit: {}", url);
            return Ok(route);
        }
    }

    debug!("Fetching route from: {}", url);
    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RouteError::Status(status));
    }

    let route = response.json::<OsrmResponse>().await?.into_route()?;
    if let Some(cache) = &cache {
        cache.insert(url, route.clone()).await;
    }
    Ok(route)
}
