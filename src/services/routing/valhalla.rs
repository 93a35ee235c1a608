//! Valhalla routing engine client
//!
//! Valhalla API documentation:
//! https://valhalla.github.io/valhalla/api/turn-by-turn/api-reference/

use async_trait::async_trait;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Coordinates;
use super::{validate_waypoints, RouteGeometry, RouteInfo, RoutingError, RoutingService};

/// Valhalla client configuration
#[derive(Debug, Clone)]
pub struct ValhallaConfig {
    /// Base URL of Valhalla server (e.g., "http://localhost:8002")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ValhallaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ValhallaConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Valhalla routing client
pub struct ValhallaClient {
    client: Client,
    config: ValhallaConfig,
}

impl ValhallaClient {
    pub fn new(config: ValhallaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Build the truck route request for the given waypoints
    fn build_route_request(&self, locations: &[Coordinates]) -> RouteRequest {
        let locs: Vec<ValhallaLocation> = locations
            .iter()
            .map(|c| ValhallaLocation {
                lat: c.lat,
                lon: c.lng,
                // Geocoded city centroids are often off-road
                radius: Some(500),
            })
            .collect();

        RouteRequest {
            locations: locs,
            costing: "truck".to_string(),
            units: "miles".to_string(),
            directions_type: "none".to_string(),
        }
    }

    async fn request_route(&self, locations: &[Coordinates]) -> Result<RouteResponse, RoutingError> {
        let request = self.build_route_request(locations);
        let url = format!("{}/route", self.config.base_url);

        debug!("Requesting truck route from Valhalla for {} locations", locations.len());

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RoutingError::ProviderUnavailable(format!("Failed to send route request to Valhalla: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| RoutingError::ProviderUnavailable(format!("Failed to parse Valhalla route response: {}", e)))
    }
}

/// Valhalla answers 400 with an error body when no path exists or a
/// location cannot be snapped to the road network.
fn classify_failure(status: StatusCode, body: &str) -> RoutingError {
    if status == StatusCode::BAD_REQUEST {
        let message = serde_json::from_str::<ValhallaError>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| body.to_string());
        RoutingError::NotFound(message)
    } else {
        RoutingError::ProviderUnavailable(format!("Valhalla returned error {}: {}", status, body))
    }
}

/// Concatenate leg shapes into a single `[lng, lat]` line
fn join_leg_shapes(legs: &[Leg]) -> Result<Vec<[f64; 2]>> {
    let mut all_coordinates: Vec<[f64; 2]> = Vec::new();
    for (i, leg) in legs.iter().enumerate() {
        let leg_coords = decode_polyline(&leg.shape, 6)?;
        debug!("Leg {} has {} points", i, leg_coords.len());

        // Subsequent legs repeat the previous leg's last point
        if i == 0 {
            all_coordinates.extend(leg_coords);
        } else {
            all_coordinates.extend(leg_coords.into_iter().skip(1));
        }
    }
    Ok(all_coordinates)
}

#[async_trait]
impl RoutingService for ValhallaClient {
    async fn resolve_route(
        &self,
        origin: Coordinates,
        pickup: Coordinates,
        dropoff: Coordinates,
    ) -> Result<RouteInfo, RoutingError> {
        let waypoints = [origin, pickup, dropoff];
        validate_waypoints(&waypoints)?;

        let response = self.request_route(&waypoints).await?;
        let coordinates = join_leg_shapes(&response.trip.legs)
            .map_err(|e| RoutingError::ProviderUnavailable(e.to_string()))?;

        debug!(
            "Valhalla route: {:.1} mi, {:.0} s, {} points",
            response.trip.summary.length,
            response.trip.summary.time,
            coordinates.len()
        );

        RouteInfo::from_totals(
            response.trip.summary.length,
            response.trip.summary.time,
            RouteGeometry { coordinates },
        )
    }

    fn name(&self) -> &str {
        "Valhalla"
    }
}

// Valhalla API types

#[derive(Debug, Serialize, Clone)]
struct ValhallaLocation {
    lat: f64,
    lon: f64,
    /// Radius in meters for snapping to roads
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RouteRequest {
    locations: Vec<ValhallaLocation>,
    costing: String,
    units: String,
    directions_type: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    trip: Trip,
}

#[derive(Debug, Deserialize)]
struct Trip {
    summary: Summary,
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    /// Length in the requested units (miles)
    length: f64,
    /// Time in seconds
    time: f64,
}

#[derive(Debug, Deserialize)]
struct Leg {
    /// Encoded polyline shape
    shape: String,
}

#[derive(Debug, Deserialize)]
struct ValhallaError {
    error: String,
}

/// Decode Valhalla's encoded polyline format
/// Precision is 6 decimal places for Valhalla (vs 5 for Google)
fn decode_polyline(encoded: &str, precision: u32) -> Result<Vec<[f64; 2]>> {
    let factor = 10_f64.powi(precision as i32);
    let mut coordinates = Vec::new();
    let mut lat = 0i64;
    let mut lng = 0i64;

    let bytes = encoded.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        lat += decode_value(bytes, &mut i)?;
        lng += decode_value(bytes, &mut i)?;

        // GeoJSON uses [lng, lat] order
        coordinates.push([lng as f64 / factor, lat as f64 / factor]);
    }

    Ok(coordinates)
}

fn decode_value(bytes: &[u8], i: &mut usize) -> Result<i64> {
    let mut shift = 0;
    let mut result = 0i64;
    loop {
        if *i >= bytes.len() || shift > 60 {
            anyhow::bail!("Invalid polyline encoding");
        }
        let byte = bytes[*i] as i64 - 63;
        *i += 1;
        result |= (byte & 0x1f) << shift;
        shift += 5;
        if byte < 0x20 {
            break;
        }
    }
    Ok(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}
