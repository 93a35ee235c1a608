//! Trip plan types: duty segments, stops, daily log sheets

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Coordinates;

/// Driver duty status. Exactly one applies at any simulated minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DutyStatus {
    OffDuty,
    Sleeper,
    Driving,
    OnDutyNotDriving,
}

impl DutyStatus {
    pub const ALL: [DutyStatus; 4] = [
        DutyStatus::OffDuty,
        DutyStatus::Sleeper,
        DutyStatus::Driving,
        DutyStatus::OnDutyNotDriving,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            DutyStatus::OffDuty => "OFF_DUTY",
            DutyStatus::Sleeper => "SLEEPER",
            DutyStatus::Driving => "DRIVING",
            DutyStatus::OnDutyNotDriving => "ON_DUTY_NOT_DRIVING",
        }
    }

    /// Driving and on-duty-not-driving minutes count as work.
    pub const fn is_on_duty(self) -> bool {
        matches!(self, DutyStatus::Driving | DutyStatus::OnDutyNotDriving)
    }
}

/// Kind of a scheduled stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopKind {
    #[serde(rename = "FUEL")]
    Fuel,
    #[serde(rename = "BREAK_30")]
    Break30,
    #[serde(rename = "OFF_DUTY_10")]
    OffDuty10,
    #[serde(rename = "PICKUP")]
    Pickup,
    #[serde(rename = "DROPOFF")]
    Dropoff,
}

impl StopKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            StopKind::Fuel => "FUEL",
            StopKind::Break30 => "BREAK_30",
            StopKind::OffDuty10 => "OFF_DUTY_10",
            StopKind::Pickup => "PICKUP",
            StopKind::Dropoff => "DROPOFF",
        }
    }
}

/// One contiguous interval `[start_minute, end_minute)` of a single duty
/// status on the global trip timeline (minute 0 = trip start).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_minute: u32,
    pub end_minute: u32,
    pub status: DutyStatus,
    pub label: String,
    /// Index into the plan's stop list when this segment was introduced by a stop.
    pub stop_index: Option<usize>,
    /// Miles driven during this segment (zero unless driving).
    pub miles: f64,
}

impl Segment {
    pub fn duration(&self) -> u32 {
        self.end_minute - self.start_minute
    }
}

/// A discrete scheduled event that introduces one non-driving segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub kind: StopKind,
    pub start_minute: u32,
    pub duration_minutes: u32,
    pub label: String,
    pub coordinates: Option<Coordinates>,
}

/// A segment clipped to a single calendar day. Minutes are minute-of-day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySegment {
    pub start_minute: u32,
    pub end_minute: u32,
    pub status: DutyStatus,
    pub label: String,
    pub stop_index: Option<usize>,
}

/// Minutes per duty status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotals {
    pub off_duty: u32,
    pub sleeper: u32,
    pub driving: u32,
    pub on_duty_not_driving: u32,
}

impl StatusTotals {
    pub fn add(&mut self, status: DutyStatus, minutes: u32) {
        match status {
            DutyStatus::OffDuty => self.off_duty += minutes,
            DutyStatus::Sleeper => self.sleeper += minutes,
            DutyStatus::Driving => self.driving += minutes,
            DutyStatus::OnDutyNotDriving => self.on_duty_not_driving += minutes,
        }
    }

    pub fn get(&self, status: DutyStatus) -> u32 {
        match status {
            DutyStatus::OffDuty => self.off_duty,
            DutyStatus::Sleeper => self.sleeper,
            DutyStatus::Driving => self.driving,
            DutyStatus::OnDutyNotDriving => self.on_duty_not_driving,
        }
    }

    pub fn total(&self) -> u32 {
        self.off_duty + self.sleeper + self.driving + self.on_duty_not_driving
    }

    pub fn merge(&mut self, other: &StatusTotals) {
        for status in DutyStatus::ALL {
            self.add(status, other.get(status));
        }
    }

    pub fn from_segments(segments: &[Segment]) -> Self {
        let mut totals = Self::default();
        for segment in segments {
            totals.add(segment.status, segment.duration());
        }
        totals
    }
}

/// Log-sheet remark written at each duty-status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    pub minute_of_day: u32,
    /// Local time of day, `HH:MM`
    pub time: String,
    pub status: DutyStatus,
    pub location: String,
}

/// One calendar day of the trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySheet {
    pub day_index: u32,
    pub date: NaiveDate,
    pub segments: Vec<DaySegment>,
    pub totals: StatusTotals,
    pub miles: f64,
    pub remarks: Vec<Remark>,
}

/// Complete output of one planning request. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripPlan {
    pub rules_version: String,
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub current_coordinates: Coordinates,
    pub pickup_coordinates: Coordinates,
    pub dropoff_coordinates: Coordinates,
    pub cycle_used_hours: f64,
    pub start_date: NaiveDate,
    pub total_miles: f64,
    pub total_drive_minutes: u32,
    /// `[lng, lat]` pairs for display
    pub route_geometry: Vec<[f64; 2]>,
    pub segments: Vec<Segment>,
    pub stops: Vec<Stop>,
    pub daily_sheets: Vec<DailySheet>,
    pub trip_completed: bool,
    /// Drive minutes actually schedulable before the cycle cap binds
    pub remaining_drive_minutes: u32,
    /// Route drive minutes that could not be scheduled
    pub unscheduled_drive_minutes: u32,
    pub planned_fuel_stops: u32,
    pub total_elapsed_minutes: u32,
}

/// Request to compute a trip plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    /// Hours already used in the 70-hour/8-day cycle (0..=70, half-hour steps)
    pub cycle_used_hours: f64,
    /// Trip start date; defaults to today (UTC)
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Already resolved coordinates skip geocoding
    #[serde(default)]
    pub current_coordinates: Option<Coordinates>,
    #[serde(default)]
    pub pickup_coordinates: Option<Coordinates>,
    #[serde(default)]
    pub dropoff_coordinates: Option<Coordinates>,
}

/// Request to fetch a stored plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPlanRequest {
    pub id: Uuid,
}

/// A persisted plan with its identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTripPlan {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub plan: TripPlan,
}

/// Light plan summary for list views
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TripPlanSummary {
    pub id: Uuid,
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    pub total_miles: f64,
    pub total_drive_minutes: i32,
    pub trip_completed: bool,
    pub created_at: DateTime<Utc>,
}
