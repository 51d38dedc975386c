//! Time window tiling
//!
//! Each harvested day is split into 24 one-hour windows, and each
//! window bounds one paginated query. Windows tile the date range
//! exactly: no gaps, no overlaps, ascending order.

use chrono::{Duration, NaiveDate};

/// One contiguous `[start, end)` slice in epoch seconds, one hour wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
    /// Day the window belongs to
    pub day: NaiveDate,
    /// Hour of day, 0..24
    pub hour: u8,
}

impl TimeWindow {
    /// Query filter for the search API.
    pub fn query_filter(&self) -> String {
        format!("(published:>={} AND published:<{})", self.start, self.end)
    }
}

/// Tiles `[from, to]` (inclusive calendar dates, UTC) into hourly
/// windows in chronological order.
pub fn hourly_windows(from: NaiveDate, to: NaiveDate) -> Vec<TimeWindow> {
    let mut windows = Vec::new();
    let mut day = from;
    while day <= to {
        let midnight = day.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc();
        let day_start = midnight.timestamp();
        for hour in 0..24u8 {
            let start = day_start + i64::from(hour) * 3600;
            windows.push(TimeWindow {
                start,
                end: start + 3600,
                day,
                hour,
            });
        }
        day += Duration::days(1);
    }
    windows
}
