//! Day splitter
//!
//! Partitions the global trip timeline into calendar days (minute 0 is local
//! midnight of the trip start date) and derives the per-day log sheet data:
//! clipped segments, per-status totals, miles and remarks.

use chrono::{Days, NaiveDate};

use crate::types::{DailySheet, DaySegment, DutyStatus, Remark, Segment, StatusTotals};

use super::error::{ensure_invariant, PlanError};
use super::rules::MINUTES_PER_DAY;

/// Split a contiguous segment sequence into daily sheets.
///
/// Segments crossing midnight are cut at the boundary; both halves keep the
/// status, label and stop reference. The last day ends where the timeline
/// ends, it is not padded to 24 hours.
pub fn split_into_days(segments: &[Segment], start_date: NaiveDate) -> Result<Vec<DailySheet>, PlanError> {
    let total_minutes = segments.last().map(|s| s.end_minute).unwrap_or(0);
    let day_count = total_minutes.div_ceil(MINUTES_PER_DAY);

    let mut sheets = Vec::with_capacity(day_count as usize);
    let mut carry_in: Option<DutyStatus> = None;

    for day_index in 0..day_count {
        let day_start = day_index * MINUTES_PER_DAY;
        let day_end = day_start + MINUTES_PER_DAY;

        let date = start_date
            .checked_add_days(Days::new(u64::from(day_index)))
            .ok_or_else(|| PlanError::Internal(format!("date overflow at day {}", day_index)))?;

        let mut sheet = DailySheet {
            day_index,
            date,
            segments: Vec::new(),
            totals: StatusTotals::default(),
            miles: 0.0,
            remarks: Vec::new(),
        };

        for segment in segments
            .iter()
            .filter(|s| s.start_minute < day_end && s.end_minute > day_start)
        {
            let start = segment.start_minute.max(day_start);
            let end = segment.end_minute.min(day_end);
            let minutes = end - start;

            sheet.totals.add(segment.status, minutes);
            if segment.status == DutyStatus::Driving && segment.duration() > 0 {
                sheet.miles += segment.miles * f64::from(minutes) / f64::from(segment.duration());
            }

            if carry_in != Some(segment.status) {
                sheet.remarks.push(remark_at(start - day_start, segment));
            }
            carry_in = Some(segment.status);

            sheet.segments.push(DaySegment {
                start_minute: start - day_start,
                end_minute: end - day_start,
                status: segment.status,
                label: segment.label.clone(),
                stop_index: segment.stop_index,
            });
        }

        sheets.push(sheet);
    }

    verify_round_trip(segments, &sheets)?;
    Ok(sheets)
}

fn remark_at(minute_of_day: u32, segment: &Segment) -> Remark {
    Remark {
        minute_of_day,
        time: format_minute_of_day(minute_of_day),
        status: segment.status,
        location: segment.label.clone(),
    }
}

/// `HH:MM` for a minute of the day
pub fn format_minute_of_day(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn verify_round_trip(segments: &[Segment], sheets: &[DailySheet]) -> Result<(), PlanError> {
    let expected = StatusTotals::from_segments(segments);
    let mut actual = StatusTotals::default();
    for sheet in sheets {
        actual.merge(&sheet.totals);
    }
    ensure_invariant(actual == expected, || {
        format!("daily totals {:?} differ from timeline totals {:?}", actual, expected)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: u32, end: u32, status: DutyStatus, stop_index: Option<usize>, miles: f64) -> Segment {
        Segment {
            start_minute: start,
            end_minute: end,
            status,
            label: match status {
                DutyStatus::Driving => "En route".to_string(),
                _ => format!("stop {:?}", stop_index),
            },
            stop_index,
            miles,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_single_day_dwell_only() {
        let segments = vec![
            seg(0, 60, DutyStatus::OnDutyNotDriving, Some(0), 0.0),
            seg(60, 120, DutyStatus::OnDutyNotDriving, Some(1), 0.0),
        ];
        let sheets = split_into_days(&segments, date()).unwrap();

        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].date, date());
        assert_eq!(sheets[0].segments.len(), 2);
        assert_eq!(sheets[0].totals.on_duty_not_driving, 120);
        assert_eq!(sheets[0].totals.total(), 120);
        // Same status throughout: a single remark
        assert_eq!(sheets[0].remarks.len(), 1);
        assert_eq!(sheets[0].remarks[0].time, "00:00");
    }

    #[test]
    fn test_segment_crossing_midnight_is_split() {
        let segments = vec![
            seg(0, 60, DutyStatus::OnDutyNotDriving, Some(0), 0.0),
            seg(60, 1200, DutyStatus::Driving, None, 1000.0),
            seg(1200, 1800, DutyStatus::Sleeper, Some(1), 0.0),
            seg(1800, 1860, DutyStatus::OnDutyNotDriving, Some(2), 0.0),
        ];
        let sheets = split_into_days(&segments, date()).unwrap();

        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[1].date, NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());

        let tail = sheets[0].segments.last().unwrap();
        let head = &sheets[1].segments[0];
        assert_eq!((tail.start_minute, tail.end_minute), (1200, 1440));
        assert_eq!((head.start_minute, head.end_minute), (0, 360));
        assert_eq!(tail.status, DutyStatus::Sleeper);
        assert_eq!(head.status, DutyStatus::Sleeper);
        assert_eq!(tail.stop_index, Some(1));
        assert_eq!(head.stop_index, Some(1));

        assert_eq!(sheets[0].totals.total(), 1440);
        assert_eq!(sheets[1].totals.sleeper, 360);
        assert_eq!(sheets[1].totals.on_duty_not_driving, 60);
    }

    #[test]
    fn test_carry_in_status_suppresses_remark_at_midnight() {
        let segments = vec![
            seg(0, 1000, DutyStatus::OffDuty, Some(0), 0.0),
            seg(1000, 2000, DutyStatus::Sleeper, Some(1), 0.0),
            seg(2000, 2100, DutyStatus::Driving, None, 90.0),
        ];
        let sheets = split_into_days(&segments, date()).unwrap();

        assert_eq!(sheets[0].remarks.len(), 2);
        assert_eq!(sheets[0].remarks[1].time, "16:40");
        assert_eq!(sheets[0].remarks[1].status, DutyStatus::Sleeper);

        // Day 2 starts still in the sleeper berth
        assert_eq!(sheets[1].remarks.len(), 1);
        assert_eq!(sheets[1].remarks[0].status, DutyStatus::Driving);
        assert_eq!(sheets[1].remarks[0].minute_of_day, 560);
        assert_eq!(sheets[1].remarks[0].location, "En route");
    }

    #[test]
    fn test_status_change_at_midnight_gets_remark() {
        let segments = vec![
            seg(0, 1440, DutyStatus::Sleeper, Some(0), 0.0),
            seg(1440, 1500, DutyStatus::Driving, None, 55.0),
        ];
        let sheets = split_into_days(&segments, date()).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[1].remarks.len(), 1);
        assert_eq!(sheets[1].remarks[0].time, "00:00");
    }

    #[test]
    fn test_miles_follow_clipped_driving_minutes() {
        let segments = vec![
            seg(0, 1340, DutyStatus::OffDuty, Some(0), 0.0),
            seg(1340, 1540, DutyStatus::Driving, None, 200.0),
        ];
        let sheets = split_into_days(&segments, date()).unwrap();
        assert!((sheets[0].miles - 100.0).abs() < 1e-9);
        assert!((sheets[1].miles - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_totals_over_many_days() {
        let mut segments = Vec::new();
        let mut t = 0;
        let pattern = [
            (DutyStatus::OnDutyNotDriving, 60),
            (DutyStatus::Driving, 480),
            (DutyStatus::OffDuty, 30),
            (DutyStatus::Driving, 180),
            (DutyStatus::Sleeper, 600),
        ];
        for (i, (status, minutes)) in pattern.iter().cycle().take(23).enumerate() {
            let stop = if *status == DutyStatus::Driving { None } else { Some(i) };
            segments.push(seg(t, t + minutes, *status, stop, f64::from(*minutes)));
            t += minutes;
        }

        let sheets = split_into_days(&segments, date()).unwrap();
        let mut summed = StatusTotals::default();
        for sheet in &sheets {
            summed.merge(&sheet.totals);
        }
        assert_eq!(summed, StatusTotals::from_segments(&segments));
        assert_eq!(sheets.len() as u32, t.div_ceil(1440));
        for sheet in &sheets[..sheets.len() - 1] {
            assert_eq!(sheet.totals.total(), 1440);
        }
        for (i, sheet) in sheets.iter().enumerate() {
            assert_eq!(sheet.day_index as usize, i);
        }
    }

    #[test]
    fn test_empty_timeline_has_no_sheets() {
        assert!(split_into_days(&[], date()).unwrap().is_empty());
    }

    #[test]
    fn test_format_minute_of_day() {
        assert_eq!(format_minute_of_day(0), "00:00");
        assert_eq!(format_minute_of_day(615), "10:15");
        assert_eq!(format_minute_of_day(1439), "23:59");
    }
}
