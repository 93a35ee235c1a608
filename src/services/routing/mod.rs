//! Route resolution for a trip: current location -> pickup -> dropoff
//!
//! Uses Valhalla (truck costing) for production, mock for tests.

mod valhalla;

pub use valhalla::{ValhallaClient, ValhallaConfig};

use async_trait::async_trait;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::services::geo::haversine_miles;
use crate::types::Coordinates;

/// Route resolution failures surfaced to the caller
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    /// A location could not be resolved or no route exists between points
    #[error("not found: {0}")]
    NotFound(String),

    #[error("routing provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
}

/// Route geometry as GeoJSON coordinates
/// Coordinates are in [longitude, latitude] order (GeoJSON standard)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    /// Array of [lng, lat] coordinates forming the route polyline
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteGeometry {
    pub fn empty() -> Self {
        Self { coordinates: vec![] }
    }

    /// Create geometry from a list of coordinates (straight lines)
    pub fn from_coordinates(coords: &[Coordinates]) -> Self {
        Self {
            coordinates: coords
                .iter()
                .map(|c| [c.lng, c.lat])
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// Resolved route totals for the whole trip
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    pub distance_miles: f64,
    pub drive_minutes: u32,
    pub geometry: RouteGeometry,
}

impl RouteInfo {
    /// Build from provider totals, rounding the drive time to whole minutes.
    pub fn from_totals(distance_miles: f64, drive_seconds: f64, geometry: RouteGeometry) -> Result<Self, RoutingError> {
        if !distance_miles.is_finite() || distance_miles < 0.0 {
            return Err(RoutingError::ProviderUnavailable(format!(
                "provider returned invalid distance {}", distance_miles
            )));
        }
        if !drive_seconds.is_finite() || drive_seconds < 0.0 {
            return Err(RoutingError::ProviderUnavailable(format!(
                "provider returned invalid duration {}", drive_seconds
            )));
        }
        Ok(Self {
            distance_miles,
            drive_minutes: (drive_seconds / 60.0).round() as u32,
            geometry,
        })
    }
}

/// Reject coordinates outside the valid lat/lng ranges before any request
pub fn validate_waypoints(waypoints: &[Coordinates]) -> Result<(), RoutingError> {
    match waypoints.iter().find(|c| !c.is_valid()) {
        Some(c) => Err(RoutingError::InvalidCoordinates(format!("({}, {})", c.lat, c.lng))),
        None => Ok(()),
    }
}

/// Routing service trait for abstraction (Valhalla, mock, etc.)
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Resolve the route origin -> pickup -> dropoff
    async fn resolve_route(
        &self,
        origin: Coordinates,
        pickup: Coordinates,
        dropoff: Coordinates,
    ) -> Result<RouteInfo, RoutingError>;

    /// Get service name for logging
    fn name(&self) -> &str;
}

/// Mock routing service for tests
/// Uses Haversine distance × coefficient for estimation
pub struct MockRoutingService {
    /// Coefficient for converting straight-line to road distance (default: 1.2)
    road_coefficient: f64,
    /// Average truck speed in mph for time estimation (default: 55)
    average_speed_mph: f64,
}

impl Default for MockRoutingService {
    fn default() -> Self {
        Self {
            road_coefficient: 1.2,
            average_speed_mph: 55.0,
        }
    }
}

impl MockRoutingService {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_params(road_coefficient: f64, average_speed_mph: f64) -> Self {
        Self {
            road_coefficient,
            average_speed_mph,
        }
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn resolve_route(
        &self,
        origin: Coordinates,
        pickup: Coordinates,
        dropoff: Coordinates,
    ) -> Result<RouteInfo, RoutingError> {
        let waypoints = [origin, pickup, dropoff];
        validate_waypoints(&waypoints)?;

        let miles: f64 = waypoints
            .windows(2)
            .map(|pair| haversine_miles(&pair[0], &pair[1]) * self.road_coefficient)
            .sum();
        let seconds = miles / self.average_speed_mph * 3600.0;

        RouteInfo::from_totals(miles, seconds, RouteGeometry::from_coordinates(&waypoints))
    }

    fn name(&self) -> &str {
        "MockRouting"
    }
}

/// Create routing service with automatic Valhalla detection and fallback
///
/// Tries to connect to Valhalla if URL is provided. Falls back to mock
/// routing service if Valhalla is unavailable or URL is not configured.
pub async fn create_routing_service_with_fallback(
    valhalla_url: Option<String>,
) -> Box<dyn RoutingService> {
    use tracing::{info, warn};

    if let Some(url) = valhalla_url {
        match ValhallaClient::new(ValhallaConfig::new(&url)) {
            Ok(client) => match check_valhalla_health(&url).await {
                Ok(()) => {
                    info!("Valhalla routing service available at {}", url);
                    return Box::new(client);
                }
                Err(e) => {
                    warn!("Valhalla not available at {}: {}. Falling back to mock routing.", url, e);
                }
            },
            Err(e) => warn!("Failed to build Valhalla client: {}", e),
        }
    }

    info!("Using mock routing service (Valhalla not configured or unavailable)");
    Box::new(MockRoutingService::new())
}

/// Check if Valhalla is healthy by making a simple status request
async fn check_valhalla_health(base_url: &str) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let url = format!("{}/status", base_url);
    let response = client.get(&url).send().await?;

    if response.status().is_success() {
        Ok(())
    } else {
        anyhow::bail!("Valhalla returned status {}", response.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn philadelphia() -> Coordinates {
        Coordinates { lat: 39.9526, lng: -75.1652 }
    }

    fn pittsburgh() -> Coordinates {
        Coordinates { lat: 40.4406, lng: -79.9959 }
    }

    fn chicago() -> Coordinates {
        Coordinates { lat: 41.8781, lng: -87.6298 }
    }

    #[tokio::test]
    async fn test_mock_routing_three_waypoints() {
        let service = MockRoutingService::new();
        let route = service
            .resolve_route(philadelphia(), pittsburgh(), chicago())
            .await
            .unwrap();

        // ~257 + ~411 straight-line miles, × 1.2
        assert!(route.distance_miles > 760.0 && route.distance_miles < 840.0,
            "Expected ~800 miles, got {}", route.distance_miles);

        // ~800 miles at 55 mph is ~14.5 hours
        let hours = f64::from(route.drive_minutes) / 60.0;
        assert!(hours > 13.5 && hours < 15.5, "Expected ~14.5 hours, got {}", hours);

        assert_eq!(route.geometry.coordinates.len(), 3);
        assert_eq!(route.geometry.coordinates[0], [-75.1652, 39.9526]);
    }

    #[test]
    fn test_mock_routing_rejects_invalid_waypoint() {
        let service = MockRoutingService::new();
        let bad = Coordinates { lat: 95.0, lng: 0.0 };
        let result = tokio_test::block_on(service.resolve_route(philadelphia(), bad, chicago()));
        assert!(matches!(result, Err(RoutingError::InvalidCoordinates(_))));
    }

    #[tokio::test]
    async fn test_mock_routing_same_point_is_zero() {
        let service = MockRoutingService::new();
        let p = chicago();
        let route = service.resolve_route(p, p, p).await.unwrap();
        assert_eq!(route.distance_miles, 0.0);
        assert_eq!(route.drive_minutes, 0);
    }

    #[tokio::test]
    async fn test_mock_routing_custom_params() {
        let service = MockRoutingService::with_params(1.0, 60.0);
        let default = MockRoutingService::new();
        let custom = service.resolve_route(philadelphia(), philadelphia(), pittsburgh()).await.unwrap();
        let baseline = default.resolve_route(philadelphia(), philadelphia(), pittsburgh()).await.unwrap();
        assert!((baseline.distance_miles / custom.distance_miles - 1.2).abs() < 1e-9);
        assert!(custom.drive_minutes < baseline.drive_minutes);
    }

    #[tokio::test]
    async fn test_mock_routing_rejects_invalid_coordinates() {
        let service = MockRoutingService::new();
        let bad = Coordinates { lat: 95.0, lng: 0.0 };
        let err = service.resolve_route(philadelphia(), bad, chicago()).await.unwrap_err();
        assert!(matches!(err, RoutingError::InvalidCoordinates(_)));
    }

    #[test]
    fn test_route_info_from_totals() {
        let info = RouteInfo::from_totals(100.0, 6630.0, RouteGeometry::empty()).unwrap();
        assert_eq!(info.drive_minutes, 111);
        assert!(RouteInfo::from_totals(f64::NAN, 60.0, RouteGeometry::empty()).is_err());
        assert!(RouteInfo::from_totals(10.0, -1.0, RouteGeometry::empty()).is_err());
    }

    #[test]
    fn test_routing_service_name() {
        let mock = MockRoutingService::new();
        assert_eq!(mock.name(), "MockRouting");
    }

    #[tokio::test]
    async fn test_create_routing_service_with_fallback_no_url() {
        let service = create_routing_service_with_fallback(None).await;
        assert_eq!(service.name(), "MockRouting");
    }

    #[tokio::test]
    async fn test_create_routing_service_with_fallback_invalid_url() {
        // Should fall back to mock when URL is invalid/unreachable
        let service = create_routing_service_with_fallback(
            Some("http://localhost:99999".to_string())
        ).await;
        assert_eq!(service.name(), "MockRouting");
    }

    #[tokio::test]
    #[ignore = "Requires running Valhalla server"]
    async fn test_create_routing_service_with_fallback_valhalla_available() {
        let service = create_routing_service_with_fallback(
            Some("http://localhost:8002".to_string())
        ).await;
        assert_eq!(service.name(), "Valhalla");
    }
}
