//! Trip assembler
//!
//! Resolves locations and the route, then runs the pure core (simulator and
//! day splitter) and fills the [`TripPlan`]. Network I/O happens strictly
//! before the core runs.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::services::geo::point_along;
use crate::services::geocoding::LocationResolver;
use crate::services::routing::{RouteInfo, RoutingError, RoutingService};
use crate::types::{Coordinates, DutyStatus, PlanRequest, Stop, StopKind, TripPlan};

use super::day_split::split_into_days;
use super::error::PlanError;
use super::rules::HosRules;
use super::simulator::{simulate, SimulationOutcome, TripEndpoints};

/// Locations of one trip, labels and resolved coordinates
#[derive(Debug, Clone)]
pub struct ResolvedTrip {
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub current_coordinates: Coordinates,
    pub pickup_coordinates: Coordinates,
    pub dropoff_coordinates: Coordinates,
}

pub struct TripPlanner {
    rules: HosRules,
    routing: Arc<dyn RoutingService>,
    resolver: Arc<dyn LocationResolver>,
}

impl TripPlanner {
    pub fn new(rules: HosRules, routing: Arc<dyn RoutingService>, resolver: Arc<dyn LocationResolver>) -> Self {
        Self { rules, routing, resolver }
    }

    pub fn rules(&self) -> &HosRules {
        &self.rules
    }

    /// Plan one trip end to end
    pub async fn plan(&self, request: &PlanRequest) -> Result<TripPlan, PlanError> {
        validate_request(request, &self.rules)?;

        let trip = ResolvedTrip {
            current_coordinates: self.locate(&request.current_location, request.current_coordinates).await?,
            pickup_coordinates: self.locate(&request.pickup_location, request.pickup_coordinates).await?,
            dropoff_coordinates: self.locate(&request.dropoff_location, request.dropoff_coordinates).await?,
            current_location: request.current_location.trim().to_string(),
            pickup_location: request.pickup_location.trim().to_string(),
            dropoff_location: request.dropoff_location.trim().to_string(),
        };

        let route = self
            .routing
            .resolve_route(trip.current_coordinates, trip.pickup_coordinates, trip.dropoff_coordinates)
            .await
            .map_err(|e| {
                warn!("Route resolution via {} failed: {}", self.routing.name(), e);
                PlanError::from(e)
            })?;

        debug!(
            "Route via {}: {:.1} mi, {} min",
            self.routing.name(),
            route.distance_miles,
            route.drive_minutes
        );

        let start_date = request.start_date.unwrap_or_else(|| Utc::now().date_naive());
        assemble(&self.rules, trip, route, request.cycle_used_hours, start_date)
    }

    /// Supplied coordinates win, otherwise ask the resolver.
    async fn locate(&self, query: &str, supplied: Option<Coordinates>) -> Result<Coordinates, PlanError> {
        if let Some(coordinates) = supplied {
            return Ok(coordinates);
        }

        match self.resolver.resolve(query).await {
            Ok(Some(result)) => {
                debug!("Resolved '{}' to ({}, {}) via {}", query, result.coordinates.lat, result.coordinates.lng, self.resolver.name());
                Ok(result.coordinates)
            }
            Ok(None) => Err(RoutingError::NotFound(format!("location '{}'", query.trim())).into()),
            Err(e) => Err(RoutingError::ProviderUnavailable(format!("geocoding '{}': {}", query.trim(), e)).into()),
        }
    }
}

/// Reject inputs that must never reach the simulator
pub fn validate_request(request: &PlanRequest, rules: &HosRules) -> Result<(), PlanError> {
    let hours = request.cycle_used_hours;
    if !hours.is_finite() || hours < 0.0 || hours > rules.cycle_limit_hours() {
        return Err(PlanError::InvalidInput(format!(
            "cycleUsedHours must be between 0 and {}, got {}",
            rules.cycle_limit_hours(),
            hours
        )));
    }

    let locations = [
        ("currentLocation", &request.current_location, request.current_coordinates),
        ("pickupLocation", &request.pickup_location, request.pickup_coordinates),
        ("dropoffLocation", &request.dropoff_location, request.dropoff_coordinates),
    ];
    for (field, text, coordinates) in locations {
        if text.trim().is_empty() {
            return Err(PlanError::InvalidInput(format!("{} must not be empty", field)));
        }
        if let Some(c) = coordinates {
            if !c.is_valid() {
                return Err(PlanError::InvalidInput(format!(
                    "{} coordinates out of range: ({}, {})",
                    field, c.lat, c.lng
                )));
            }
        }
    }
    Ok(())
}

/// Run the pure core on already resolved inputs and build the plan.
pub fn assemble(
    rules: &HosRules,
    trip: ResolvedTrip,
    route: RouteInfo,
    cycle_used_hours: f64,
    start_date: NaiveDate,
) -> Result<TripPlan, PlanError> {
    let cycle_used_minutes = (cycle_used_hours * 60.0).round() as u32;

    let endpoints = TripEndpoints {
        pickup_label: trip.pickup_location.clone(),
        dropoff_label: trip.dropoff_location.clone(),
        pickup_coordinates: Some(trip.pickup_coordinates),
        dropoff_coordinates: Some(trip.dropoff_coordinates),
    };

    let outcome = simulate(rules, &route, cycle_used_minutes, &endpoints)?;
    debug!(
        "Simulated {:.1} of {:.1} mi, cycle at {} min",
        outcome.scheduled_miles, route.distance_miles, outcome.final_cycle_used_minutes
    );
    let daily_sheets = split_into_days(&outcome.segments, start_date)?;
    let stops = locate_stops(&outcome, &route);
    let planned_fuel_stops = planned_fuel_stops(rules, &route, &outcome);

    let plan = TripPlan {
        rules_version: rules.version.clone(),
        current_location: trip.current_location,
        pickup_location: trip.pickup_location,
        dropoff_location: trip.dropoff_location,
        current_coordinates: trip.current_coordinates,
        pickup_coordinates: trip.pickup_coordinates,
        dropoff_coordinates: trip.dropoff_coordinates,
        cycle_used_hours,
        start_date,
        total_miles: route.distance_miles,
        total_drive_minutes: route.drive_minutes,
        trip_completed: outcome.trip_completed,
        remaining_drive_minutes: outcome.scheduled_drive_minutes,
        unscheduled_drive_minutes: route.drive_minutes - outcome.scheduled_drive_minutes,
        planned_fuel_stops,
        total_elapsed_minutes: outcome.total_minutes(),
        route_geometry: route.geometry.coordinates,
        segments: outcome.segments,
        stops,
        daily_sheets,
    };

    if plan.trip_completed {
        info!(
            "Planned {} -> {} -> {}: {:.0} mi over {} day(s), {} stops",
            plan.current_location,
            plan.pickup_location,
            plan.dropoff_location,
            plan.total_miles,
            plan.daily_sheets.len(),
            plan.stops.len()
        );
    } else {
        warn!(
            "Insufficient cycle hours: {} of {} drive minutes achievable ({}h used)",
            plan.remaining_drive_minutes, plan.total_drive_minutes, cycle_used_hours
        );
    }

    Ok(plan)
}

/// Give en-route stops a position by interpolating along the route geometry
/// at the share of route driving done before the stop.
fn locate_stops(outcome: &SimulationOutcome, route: &RouteInfo) -> Vec<Stop> {
    let line = &route.geometry.coordinates;

    outcome
        .stops
        .iter()
        .map(|stop| {
            if stop.coordinates.is_some() || line.is_empty() {
                return stop.clone();
            }
            let fraction = if route.drive_minutes == 0 {
                0.0
            } else {
                let driven: u32 = outcome
                    .segments
                    .iter()
                    .filter(|s| s.status == DutyStatus::Driving && s.end_minute <= stop.start_minute)
                    .map(|s| s.duration())
                    .sum();
                f64::from(driven) / f64::from(route.drive_minutes)
            };
            Stop {
                coordinates: point_along(line, fraction),
                ..stop.clone()
            }
        })
        .collect()
}

fn planned_fuel_stops(rules: &HosRules, route: &RouteInfo, outcome: &SimulationOutcome) -> u32 {
    let by_distance = (route.distance_miles / rules.fuel_interval_miles).floor() as u32;
    let actual = outcome.count_stops(StopKind::Fuel) as u32;
    by_distance.max(actual)
}
