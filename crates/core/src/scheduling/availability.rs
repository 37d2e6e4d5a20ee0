use chrono::{DateTime, Datelike, Duration, Utc};
use chrono_tz::Tz;

use crate::domain::calendar::{local_instant, BusyInterval, TimeSlot};

/// Hard cap on the number of candidate slots returned by one search,
/// applied before any presentation-layer truncation.
pub const MAX_SLOTS: usize = 10;

/// Working-day bounds in local wall-clock hours, half-open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for WorkHours {
    fn default() -> Self {
        Self { start_hour: 9, end_hour: 17 }
    }
}

/// Inputs for one availability search. Pure data: the busy intervals are
/// supplied by the caller, so the search itself is deterministic.
#[derive(Clone, Debug)]
pub struct SlotSearch {
    pub duration_minutes: i64,
    pub buffer_minutes: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub work_hours: WorkHours,
    pub include_weekends: bool,
    pub tz: Tz,
}

/// Find candidate slots for a meeting.
///
/// Walks each calendar day in the window (weekends skipped unless
/// requested), clips busy intervals to the working day, and emits at most
/// one first-fit slot per gap: a gap qualifies when it holds the duration
/// plus the buffer, and the cursor then jumps past the busy interval plus
/// buffer. The trailing gap of a day only needs to hold the duration. This
/// deliberately trades completeness inside large gaps for a small,
/// predictable result set.
pub fn find_slots(search: &SlotSearch, busy: &[BusyInterval]) -> Vec<TimeSlot> {
    if search.duration_minutes <= 0 || search.window_end <= search.window_start {
        return Vec::new();
    }

    let duration = Duration::minutes(search.duration_minutes);
    let buffer = Duration::minutes(search.buffer_minutes.max(0));
    let mut slots = Vec::new();

    let mut date = search.window_start.with_timezone(&search.tz).date_naive();
    let last_date = search.window_end.with_timezone(&search.tz).date_naive();

    while date <= last_date {
        let is_weekend = date.weekday().num_days_from_monday() >= 5;
        if is_weekend && !search.include_weekends {
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
            continue;
        }

        let bounds = (
            local_instant(search.tz, date, search.work_hours.start_hour, 0),
            local_instant(search.tz, date, search.work_hours.end_hour, 0),
        );
        if let (Some(work_start), Some(work_end)) = bounds {
            let day_start = work_start.max(search.window_start);
            let day_end = work_end.min(search.window_end);
            if day_start < day_end {
                collect_day_slots(&mut slots, day_start, day_end, busy, duration, buffer);
            }
        }

        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    slots.truncate(MAX_SLOTS);
    slots
}

fn collect_day_slots(
    out: &mut Vec<TimeSlot>,
    day_start: DateTime<Utc>,
    day_end: DateTime<Utc>,
    busy: &[BusyInterval],
    duration: Duration,
    buffer: Duration,
) {
    let mut day_busy: Vec<BusyInterval> = busy
        .iter()
        .filter(|interval| interval.overlaps(day_start, day_end))
        .map(|interval| BusyInterval {
            start: interval.start.max(day_start),
            end: interval.end.min(day_end),
        })
        .collect();
    day_busy.sort_by_key(|interval| interval.start);

    let duration_minutes = duration.num_minutes();
    let mut cursor = day_start;

    for interval in &day_busy {
        if interval.start - cursor >= duration + buffer {
            out.push(TimeSlot {
                start: cursor,
                end: cursor + duration,
                duration_minutes,
            });
        }
        cursor = cursor.max(interval.end + buffer);
    }

    if day_end - cursor >= duration {
        out.push(TimeSlot { start: cursor, end: cursor + duration, duration_minutes });
    }
}
