//! Start-time estimation against weekly availability.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

use crate::models::{TimeWindow, WeeklyAvailability};

/// Earliest start on `now`'s day for a route of `duration_minutes`, after
/// `booked_minutes` of work already placed in the day's windows.
///
/// Booked minutes fill the windows in order. A route never straddles two
/// windows. Returns `None` when nothing fits.
pub fn open_slot(
    availability: &WeeklyAvailability,
    now: DateTime<Utc>,
    booked_minutes: i64,
    duration_minutes: u32,
) -> Option<DateTime<Utc>> {
    let windows = availability.windows_for(now.weekday());
    let offset = slot_offset(&windows, booked_minutes, i64::from(duration_minutes))?;
    Some(now.date_naive().and_time(offset).and_utc())
}

fn slot_offset(
    windows: &[TimeWindow],
    booked_minutes: i64,
    duration_minutes: i64,
) -> Option<NaiveTime> {
    let mut remaining = booked_minutes.max(0);
    for window in windows {
        let length = window.minutes();
        if remaining >= length {
            remaining -= length;
            continue;
        }
        if length - remaining >= duration_minutes {
            return Some(window.start + Duration::minutes(remaining));
        }
        remaining = 0;
    }
    None
}

/// Start time when availability is not consulted.
pub fn default_start(
    now: DateTime<Utc>,
    shift_start: NaiveTime,
    booked_minutes: i64,
) -> DateTime<Utc> {
    now.date_naive().and_time(shift_start).and_utc() + Duration::minutes(booked_minutes.max(0))
}
