//! Hours-of-service rule constants
//!
//! FMCSA property-carrying limits (70-hour / 8-day cycle). The record is
//! versioned: every plan echoes the version it was computed under. A
//! deployment may only choose the fuel-stop dwell.

use serde::{Deserialize, Serialize};

pub const RULES_VERSION: &str = "fmcsa-property-70-8";

pub const MINUTES_PER_DAY: u32 = 1440;

pub const DEFAULT_FUEL_STOP_MINUTES: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HosRules {
    pub version: String,
    /// 11 hours of driving per shift
    pub max_drive_minutes_per_shift: u32,
    /// 14-hour on-duty window
    pub max_duty_window_minutes: u32,
    /// 30-minute break due after 8 hours of driving
    pub break_required_after_drive_minutes: u32,
    pub break_duration_minutes: u32,
    /// 10 consecutive hours off duty / sleeper
    pub reset_duration_minutes: u32,
    /// 70 hours on duty in the rolling window
    pub cycle_limit_minutes: u32,
    pub cycle_window_days: u32,
    pub fuel_interval_miles: f64,
    pub fuel_stop_duration_minutes: u32,
    pub pickup_dwell_minutes: u32,
    pub dropoff_dwell_minutes: u32,
}

impl Default for HosRules {
    fn default() -> Self {
        Self {
            version: RULES_VERSION.to_string(),
            max_drive_minutes_per_shift: 11 * 60,
            max_duty_window_minutes: 14 * 60,
            break_required_after_drive_minutes: 8 * 60,
            break_duration_minutes: 30,
            reset_duration_minutes: 10 * 60,
            cycle_limit_minutes: 70 * 60,
            cycle_window_days: 8,
            fuel_interval_miles: 1000.0,
            fuel_stop_duration_minutes: DEFAULT_FUEL_STOP_MINUTES,
            pickup_dwell_minutes: 60,
            dropoff_dwell_minutes: 60,
        }
    }
}

impl HosRules {
    pub fn with_fuel_stop_minutes(mut self, minutes: u32) -> Self {
        self.fuel_stop_duration_minutes = minutes;
        self
    }

    /// Cycle limit expressed in hours, the unit drivers report usage in.
    pub fn cycle_limit_hours(&self) -> f64 {
        f64::from(self.cycle_limit_minutes) / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_match_regulation() {
        let rules = HosRules::default();
        assert_eq!(rules.max_drive_minutes_per_shift, 660);
        assert_eq!(rules.max_duty_window_minutes, 840);
        assert_eq!(rules.break_required_after_drive_minutes, 480);
        assert_eq!(rules.break_duration_minutes, 30);
        assert_eq!(rules.reset_duration_minutes, 600);
        assert_eq!(rules.cycle_limit_minutes, 4200);
        assert_eq!(rules.cycle_window_days, 8);
        assert_eq!(rules.fuel_interval_miles, 1000.0);
        assert_eq!(rules.pickup_dwell_minutes, 60);
        assert_eq!(rules.dropoff_dwell_minutes, 60);
        assert_eq!(rules.version, RULES_VERSION);
    }

    #[test]
    fn test_fuel_stop_override() {
        let rules = HosRules::default().with_fuel_stop_minutes(45);
        assert_eq!(rules.fuel_stop_duration_minutes, 45);
        assert_eq!(rules.max_drive_minutes_per_shift, 660);
    }

    #[test]
    fn test_cycle_limit_hours() {
        assert_eq!(HosRules::default().cycle_limit_hours(), 70.0);
    }
}
