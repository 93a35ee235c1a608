//! Duty simulator
//!
//! Walks simulated time forward from the trip start and emits duty segments
//! and the stops that introduce them. Driving is emitted in batched chunks
//! that end exactly at the next decision point, so the result is identical
//! to a minute-by-minute walk.
//!
//! Sequence: pickup dwell, then the route's driving time interleaved with
//! resets, breaks and fuel stops, then dropoff dwell. Before every chunk of
//! driving the rules are evaluated in a fixed priority order (see
//! [`Decision`]). When the 70-hour cycle binds first, the simulation stops
//! and the partial schedule is returned with `trip_completed = false`.

use tracing::{debug, info, warn};

use crate::services::routing::RouteInfo;
use crate::types::{Coordinates, DutyStatus, Segment, Stop, StopKind};

use super::error::{ensure_invariant, PlanError};
use super::rules::HosRules;

pub const EN_ROUTE_LABEL: &str = "En route";

/// Pickup and dropoff descriptors for the dwell stops
#[derive(Debug, Clone)]
pub struct TripEndpoints {
    pub pickup_label: String,
    pub dropoff_label: String,
    pub pickup_coordinates: Option<Coordinates>,
    pub dropoff_coordinates: Option<Coordinates>,
}

#[cfg(test)]
impl TripEndpoints {
    pub fn unlabelled() -> Self {
        Self {
            pickup_label: "Pickup".to_string(),
            dropoff_label: "Dropoff".to_string(),
            pickup_coordinates: None,
            dropoff_coordinates: None,
        }
    }
}

/// Result of one simulation run
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub segments: Vec<Segment>,
    pub stops: Vec<Stop>,
    pub trip_completed: bool,
    /// Drive minutes scheduled before the simulation ended
    pub scheduled_drive_minutes: u32,
    pub scheduled_miles: f64,
    pub final_cycle_used_minutes: u32,
}

impl SimulationOutcome {
    pub fn total_minutes(&self) -> u32 {
        self.segments.last().map(|s| s.end_minute).unwrap_or(0)
    }

    pub fn count_stops(&self, kind: StopKind) -> usize {
        self.stops.iter().filter(|s| s.kind == kind).count()
    }
}

/// Next action of the decision loop. Variants are listed in priority order:
/// the first rule that matches fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// Cycle limit reached with driving left: stop scheduling.
    CycleExhausted,
    /// 11-hour drive cap or 14-hour window reached: 10-hour reset.
    Reset,
    /// 8 hours of driving since the last qualifying break.
    Break,
    /// Fuel interval reached.
    Fuel,
    /// Drive for the given number of minutes.
    Drive(u32),
    /// All route driving scheduled.
    Arrive,
}

/// Counters tracked while advancing simulated time
#[derive(Debug, Clone, Default)]
struct DriverState {
    elapsed_minutes: u32,
    drive_minutes_since_break: u32,
    duty_minutes_since_reset: u32,
    drive_minutes_since_reset: u32,
    cycle_used_minutes: u32,
    /// Route drive minutes consumed so far
    driven_minutes: u32,
    driven_minutes_at_last_fuel: u32,
}

struct Simulator<'a> {
    rules: &'a HosRules,
    route: &'a RouteInfo,
    endpoints: &'a TripEndpoints,
    /// Driven minutes after which a fuel stop is due; `None` when the route
    /// covers no distance.
    fuel_mark_minutes: Option<u32>,
    state: DriverState,
    segments: Vec<Segment>,
    stops: Vec<Stop>,
}

/// Simulate one trip. Pure function of its inputs.
pub fn simulate(
    rules: &HosRules,
    route: &RouteInfo,
    cycle_used_minutes: u32,
    endpoints: &TripEndpoints,
) -> Result<SimulationOutcome, PlanError> {
    ensure_invariant(route.distance_miles.is_finite() && route.distance_miles >= 0.0, || {
        format!("route distance must be finite and non-negative, got {}", route.distance_miles)
    })?;

    let mut simulator = Simulator::new(rules, route, endpoints, cycle_used_minutes);
    simulator.run()
}

impl<'a> Simulator<'a> {
    fn new(
        rules: &'a HosRules,
        route: &'a RouteInfo,
        endpoints: &'a TripEndpoints,
        cycle_used_minutes: u32,
    ) -> Self {
        let fuel_mark_minutes = if route.distance_miles > 0.0 && route.drive_minutes > 0 {
            let minutes = rules.fuel_interval_miles * f64::from(route.drive_minutes) / route.distance_miles;
            Some((minutes.floor() as u32).max(1))
        } else {
            None
        };

        Self {
            rules,
            route,
            endpoints,
            fuel_mark_minutes,
            state: DriverState {
                cycle_used_minutes,
                ..Default::default()
            },
            segments: Vec::new(),
            stops: Vec::new(),
        }
    }

    fn run(mut self) -> Result<SimulationOutcome, PlanError> {
        let completed = self.schedule()?;
        self.verify_timeline()?;

        let outcome = SimulationOutcome {
            trip_completed: completed,
            scheduled_drive_minutes: self.state.driven_minutes,
            scheduled_miles: self.miles_at(self.state.driven_minutes),
            final_cycle_used_minutes: self.state.cycle_used_minutes,
            segments: self.segments,
            stops: self.stops,
        };

        if outcome.trip_completed {
            info!(
                "HOS simulation complete: {} drive min over {} elapsed min, {} stops",
                outcome.scheduled_drive_minutes,
                outcome.total_minutes(),
                outcome.stops.len()
            );
        } else {
            warn!(
                "HOS simulation stopped by cycle limit: {} of {} drive min scheduled",
                outcome.scheduled_drive_minutes, self.route.drive_minutes
            );
        }

        Ok(outcome)
    }

    /// Returns whether the trip was completed through dropoff.
    fn schedule(&mut self) -> Result<bool, PlanError> {
        if self.state.cycle_used_minutes > self.rules.cycle_limit_minutes {
            debug!("Cycle already past the limit at trip start, nothing scheduled");
            return Ok(false);
        }

        let pickup_label = self.endpoints.pickup_label.clone();
        self.emit_stop(
            StopKind::Pickup,
            DutyStatus::OnDutyNotDriving,
            self.rules.pickup_dwell_minutes,
            &pickup_label,
            &pickup_label,
            self.endpoints.pickup_coordinates,
        );

        loop {
            let decision = self.next_decision();
            debug!(
                "t={} decision={:?} drive_since_reset={} duty={} since_break={} cycle={}",
                self.state.elapsed_minutes,
                decision,
                self.state.drive_minutes_since_reset,
                self.state.duty_minutes_since_reset,
                self.state.drive_minutes_since_break,
                self.state.cycle_used_minutes
            );

            match decision {
                Decision::CycleExhausted => return Ok(false),
                Decision::Reset => self.emit_reset(),
                Decision::Break => self.emit_stop(
                    StopKind::Break30,
                    DutyStatus::OffDuty,
                    self.rules.break_duration_minutes,
                    "30-min break",
                    "30-min break",
                    None,
                ),
                Decision::Fuel => self.emit_stop(
                    StopKind::Fuel,
                    DutyStatus::OnDutyNotDriving,
                    self.rules.fuel_stop_duration_minutes,
                    "Fuel stop",
                    "Fuel stop",
                    None,
                ),
                Decision::Drive(minutes) => self.drive(minutes)?,
                Decision::Arrive => break,
            }
        }

        if self.state.duty_minutes_since_reset + self.rules.dropoff_dwell_minutes
            > self.rules.max_duty_window_minutes
        {
            self.emit_reset();
        }

        if self.state.cycle_used_minutes > self.rules.cycle_limit_minutes {
            debug!("Cycle limit exceeded before dropoff, dropoff not scheduled");
            return Ok(false);
        }

        let dropoff_label = self.endpoints.dropoff_label.clone();
        self.emit_stop(
            StopKind::Dropoff,
            DutyStatus::OnDutyNotDriving,
            self.rules.dropoff_dwell_minutes,
            &dropoff_label,
            &dropoff_label,
            self.endpoints.dropoff_coordinates,
        );

        Ok(true)
    }

    fn next_decision(&self) -> Decision {
        let rules = self.rules;
        let state = &self.state;
        let driving_left = self.drive_minutes_remaining() > 0;

        if driving_left && state.cycle_used_minutes >= rules.cycle_limit_minutes {
            return Decision::CycleExhausted;
        }
        if driving_left
            && (state.drive_minutes_since_reset >= rules.max_drive_minutes_per_shift
                || state.duty_minutes_since_reset >= rules.max_duty_window_minutes)
        {
            return Decision::Reset;
        }
        if driving_left && state.drive_minutes_since_break >= rules.break_required_after_drive_minutes {
            return Decision::Break;
        }
        if self.fuel_due() && state.cycle_used_minutes < rules.cycle_limit_minutes {
            return Decision::Fuel;
        }
        if driving_left {
            return Decision::Drive(self.drive_allowance());
        }
        Decision::Arrive
    }

    /// Minutes that can be driven before the next rule binds.
    fn drive_allowance(&self) -> u32 {
        let rules = self.rules;
        let state = &self.state;

        let mut allowance = self
            .drive_minutes_remaining()
            .min(rules.max_drive_minutes_per_shift - state.drive_minutes_since_reset)
            .min(rules.max_duty_window_minutes - state.duty_minutes_since_reset)
            .min(rules.break_required_after_drive_minutes - state.drive_minutes_since_break)
            .min(rules.cycle_limit_minutes - state.cycle_used_minutes);

        if let Some(mark) = self.fuel_mark_minutes {
            allowance = allowance.min(mark - self.driven_minutes_since_fuel());
        }
        allowance
    }

    fn drive_minutes_remaining(&self) -> u32 {
        self.route.drive_minutes - self.state.driven_minutes
    }

    fn driven_minutes_since_fuel(&self) -> u32 {
        self.state.driven_minutes - self.state.driven_minutes_at_last_fuel
    }

    /// Cumulative route miles after `driven_minutes` of driving at the
    /// route's average speed.
    fn miles_at(&self, driven_minutes: u32) -> f64 {
        if self.route.drive_minutes == 0 {
            return 0.0;
        }
        self.route.distance_miles * f64::from(driven_minutes) / f64::from(self.route.drive_minutes)
    }

    fn miles_since_fuel(&self) -> f64 {
        self.miles_at(self.state.driven_minutes) - self.miles_at(self.state.driven_minutes_at_last_fuel)
    }

    /// The fuel interval is reached when another whole minute of driving
    /// would overrun it. At the end of the route a stop is only due if the
    /// interval was reached exactly (inclusive boundary).
    fn fuel_due(&self) -> bool {
        let Some(mark) = self.fuel_mark_minutes else {
            return false;
        };
        let since = self.driven_minutes_since_fuel();
        if since < mark {
            return false;
        }
        if self.drive_minutes_remaining() > 0 {
            return true;
        }
        f64::from(since) * self.route.distance_miles
            >= self.rules.fuel_interval_miles * f64::from(self.route.drive_minutes)
    }

    fn drive(&mut self, minutes: u32) -> Result<(), PlanError> {
        ensure_invariant(minutes > 0, || {
            format!("empty driving chunk at minute {}", self.state.elapsed_minutes)
        })?;

        let miles = self.miles_at(self.state.driven_minutes + minutes) - self.miles_at(self.state.driven_minutes);
        self.push_segment(DutyStatus::Driving, minutes, EN_ROUTE_LABEL, None, miles);

        let state = &mut self.state;
        state.driven_minutes += minutes;
        state.drive_minutes_since_break += minutes;
        state.drive_minutes_since_reset += minutes;
        state.duty_minutes_since_reset += minutes;
        state.cycle_used_minutes += minutes;

        let rules = self.rules;
        let state = &self.state;
        ensure_invariant(state.drive_minutes_since_reset <= rules.max_drive_minutes_per_shift, || {
            format!("{} drive minutes since reset", state.drive_minutes_since_reset)
        })?;
        ensure_invariant(state.duty_minutes_since_reset <= rules.max_duty_window_minutes, || {
            format!("{} duty minutes since reset", state.duty_minutes_since_reset)
        })?;
        ensure_invariant(state.drive_minutes_since_break <= rules.break_required_after_drive_minutes, || {
            format!("{} drive minutes since break", state.drive_minutes_since_break)
        })?;
        ensure_invariant(state.cycle_used_minutes <= rules.cycle_limit_minutes, || {
            format!("{} cycle minutes after driving", state.cycle_used_minutes)
        })?;
        if let Some(mark) = self.fuel_mark_minutes {
            ensure_invariant(self.driven_minutes_since_fuel() <= mark, || {
                format!("{:.3} miles since last fuel stop", self.miles_since_fuel())
            })?;
        }
        Ok(())
    }

    fn emit_reset(&mut self) {
        self.emit_stop(
            StopKind::OffDuty10,
            DutyStatus::Sleeper,
            self.rules.reset_duration_minutes,
            "10-hour off-duty reset",
            "10-hour sleeper berth reset",
            None,
        );
    }

    fn emit_stop(
        &mut self,
        kind: StopKind,
        status: DutyStatus,
        duration: u32,
        stop_label: &str,
        segment_label: &str,
        coordinates: Option<Coordinates>,
    ) {
        let stop_index = self.stops.len();
        self.stops.push(Stop {
            kind,
            start_minute: self.state.elapsed_minutes,
            duration_minutes: duration,
            label: stop_label.to_string(),
            coordinates,
        });
        self.push_segment(status, duration, segment_label, Some(stop_index), 0.0);

        let state = &mut self.state;
        match kind {
            StopKind::Pickup | StopKind::Dropoff | StopKind::Fuel => {
                state.duty_minutes_since_reset += duration;
                state.cycle_used_minutes += duration;
            }
            StopKind::Break30 => {
                // Off duty: not part of the 14-hour window, counted toward the cycle.
                state.cycle_used_minutes += duration;
            }
            StopKind::OffDuty10 => {
                state.drive_minutes_since_reset = 0;
                state.duty_minutes_since_reset = 0;
            }
        }

        if kind == StopKind::Fuel {
            state.driven_minutes_at_last_fuel = state.driven_minutes;
        }
        if !status.is_on_duty() && duration >= self.rules.break_duration_minutes {
            state.drive_minutes_since_break = 0;
        }
    }

    /// Append a segment, coalescing with the previous one when both share
    /// status and originating stop.
    fn push_segment(
        &mut self,
        status: DutyStatus,
        duration: u32,
        label: &str,
        stop_index: Option<usize>,
        miles: f64,
    ) {
        if duration == 0 {
            return;
        }
        let start = self.state.elapsed_minutes;
        self.state.elapsed_minutes += duration;

        if let Some(last) = self.segments.last_mut() {
            if last.status == status && last.stop_index == stop_index && last.end_minute == start {
                last.end_minute = start + duration;
                last.miles += miles;
                return;
            }
        }

        self.segments.push(Segment {
            start_minute: start,
            end_minute: start + duration,
            status,
            label: label.to_string(),
            stop_index,
            miles,
        });
    }

    fn verify_timeline(&self) -> Result<(), PlanError> {
        if let Some(first) = self.segments.first() {
            ensure_invariant(first.start_minute == 0, || {
                format!("timeline starts at minute {}", first.start_minute)
            })?;
        }
        for pair in self.segments.windows(2) {
            ensure_invariant(pair[0].end_minute == pair[1].start_minute, || {
                format!("gap or overlap between minute {} and {}", pair[0].end_minute, pair[1].start_minute)
            })?;
        }
        for segment in &self.segments {
            ensure_invariant(segment.end_minute > segment.start_minute, || {
                format!("empty segment at minute {}", segment.start_minute)
            })?;
        }
        Ok(())
    }
}
