use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::DomainError;

/// A half-open range of time already occupied on the calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DomainError> {
        if start >= end {
            return Err(DomainError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// A candidate meeting time of exactly the requested duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
}

impl TimeSlot {
    pub fn starting_at(start: DateTime<Utc>, duration_minutes: i64) -> Result<Self, DomainError> {
        if duration_minutes <= 0 {
            return Err(DomainError::NonPositiveDuration { minutes: duration_minutes });
        }
        Ok(Self { start, end: start + Duration::minutes(duration_minutes), duration_minutes })
    }

    pub fn can_fit(&self, duration_minutes: i64) -> bool {
        self.duration_minutes >= duration_minutes
    }

    /// Spoken-style label, e.g. "Monday, December 16 at 2:00 PM - 2:30 PM".
    pub fn label(&self, tz: Tz) -> String {
        let start = self.start.with_timezone(&tz);
        let end = self.end.with_timezone(&tz);
        format!(
            "{}, {} at {} - {}",
            start.format("%A"),
            start.format("%B %-d"),
            start.format("%-I:%M %p"),
            end.format("%-I:%M %p"),
        )
    }
}

/// An event already present on the user's calendar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub event_id: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attendees: Vec<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar backend unavailable: {0}")]
    Unavailable(String),
    #[error("calendar backend rejected the request: {0}")]
    Rejected(String),
}

/// The narrow contract the scheduler needs from any calendar provider.
///
/// Implementations must return an empty list rather than fabricated data
/// when the upstream service is unreachable.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn get_busy_intervals(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, CalendarError>;

    async fn create_event(
        &self,
        title: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        description: &str,
        attendees: &[String],
    ) -> Result<Option<String>, CalendarError>;

    async fn find_event_by_name(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>, CalendarError>;
}

/// Deterministic in-memory calendar used by tests, the CLI demo, and any
/// deployment without a real provider. Busy intervals and events are seeded
/// explicitly at construction; created events are appended in memory.
pub struct StaticCalendarBackend {
    busy: Vec<BusyInterval>,
    events: RwLock<Vec<CalendarEvent>>,
}

impl StaticCalendarBackend {
    pub fn new(busy: Vec<BusyInterval>, events: Vec<CalendarEvent>) -> Self {
        Self { busy, events: RwLock::new(events) }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// A week-shaped demo calendar: every weekday has meetings 10:00-11:00
    /// and 14:00-15:30 local time, and each Friday carries an 18:00-20:00
    /// flight that also appears as a named event.
    pub fn weekday_fixture(from: DateTime<Utc>, days: u32, tz: Tz) -> Self {
        let mut busy = Vec::new();
        let mut events = Vec::new();
        let mut date = from.with_timezone(&tz).date_naive();

        for _ in 0..days {
            if date.weekday().num_days_from_monday() < 5 {
                if let (Some(start), Some(end)) =
                    (local_instant(tz, date, 10, 0), local_instant(tz, date, 11, 0))
                {
                    busy.push(BusyInterval { start, end });
                }
                if let (Some(start), Some(end)) =
                    (local_instant(tz, date, 14, 0), local_instant(tz, date, 15, 30))
                {
                    busy.push(BusyInterval { start, end });
                }
                if date.weekday() == Weekday::Fri {
                    if let (Some(start), Some(end)) =
                        (local_instant(tz, date, 18, 0), local_instant(tz, date, 20, 0))
                    {
                        busy.push(BusyInterval { start, end });
                        events.push(CalendarEvent {
                            event_id: format!("fixture-flight-{date}"),
                            summary: "Flight to Denver".to_string(),
                            start,
                            end,
                            description: "Departure from gate B12".to_string(),
                            attendees: Vec::new(),
                        });
                    }
                }
            }
            date = date.succ_opt().unwrap_or(date);
        }

        Self::new(busy, events)
    }
}

#[async_trait]
impl CalendarBackend for StaticCalendarBackend {
    async fn get_busy_intervals(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let mut intervals: Vec<BusyInterval> =
            self.busy.iter().copied().filter(|b| b.overlaps(start, end)).collect();
        let events = self.events.read().await;
        intervals.extend(
            events
                .iter()
                .filter(|e| e.start < end && start < e.end)
                .map(|e| BusyInterval { start: e.start, end: e.end }),
        );
        intervals.sort_by_key(|b| b.start);
        intervals.dedup();
        Ok(intervals)
    }

    async fn create_event(
        &self,
        title: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        description: &str,
        attendees: &[String],
    ) -> Result<Option<String>, CalendarError> {
        if start >= end {
            return Err(CalendarError::Rejected(format!(
                "event `{title}` has a non-positive duration"
            )));
        }
        let event_id = Uuid::new_v4().to_string();
        let mut events = self.events.write().await;
        events.push(CalendarEvent {
            event_id: event_id.clone(),
            summary: title.to_string(),
            start,
            end,
            description: description.to_string(),
            attendees: attendees.to_vec(),
        });
        Ok(Some(event_id))
    }

    async fn find_event_by_name(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<CalendarEvent>, CalendarError> {
        let events = self.events.read().await;
        let mut in_range: Vec<&CalendarEvent> =
            events.iter().filter(|e| e.start < end && start < e.end).collect();
        in_range.sort_by_key(|e| e.start);
        Ok(in_range.into_iter().find(|e| summary_matches(&e.summary, query)).cloned())
    }
}

/// Fuzzy name match: the query and summary share at least one significant
/// token, or one phrase contains the other.
fn summary_matches(summary: &str, query: &str) -> bool {
    let summary_lower = summary.to_ascii_lowercase();
    let query_lower = query.to_ascii_lowercase();
    if summary_lower.contains(query_lower.trim()) || query_lower.contains(summary_lower.trim()) {
        return true;
    }

    let summary_tokens: Vec<&str> =
        summary_lower.split_whitespace().filter(|t| is_significant_token(t)).collect();
    query_lower
        .split_whitespace()
        .filter(|t| is_significant_token(t))
        .any(|t| summary_tokens.contains(&t))
}

fn is_significant_token(token: &str) -> bool {
    token.len() > 2
        && !matches!(
            token,
            "the" | "that" | "this" | "and" | "for" | "with" | "from" | "leaves" | "starts"
        )
}

/// Resolve a wall-clock time in `tz` to an instant, preferring the earlier
/// interpretation across DST transitions.
pub fn local_instant(tz: Tz, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&naive).latest())
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;

    use super::{
        local_instant, BusyInterval, CalendarBackend, StaticCalendarBackend, TimeSlot,
    };

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn busy_interval_rejects_inverted_bounds() {
        let start = utc(2026, 8, 10, 11, 0);
        let end = utc(2026, 8, 10, 10, 0);
        assert!(BusyInterval::new(start, end).is_err());
        assert!(BusyInterval::new(end, start).is_ok());
    }

    #[test]
    fn slot_duration_matches_bounds() {
        let slot = TimeSlot::starting_at(utc(2026, 8, 10, 14, 0), 30).unwrap();
        assert_eq!(slot.duration_minutes, 30);
        assert_eq!((slot.end - slot.start).num_minutes(), 30);
        assert!(slot.can_fit(30));
        assert!(!slot.can_fit(45));
    }

    #[test]
    fn slot_label_uses_spoken_format() {
        // 2026-08-10 is a Monday.
        let slot = TimeSlot::starting_at(utc(2026, 8, 10, 14, 0), 30).unwrap();
        assert_eq!(slot.label(Tz::UTC), "Monday, August 10 at 2:00 PM - 2:30 PM");
    }

    #[tokio::test]
    async fn fixture_calendar_has_weekday_meetings_and_friday_flight() {
        // 2026-08-10 (Monday) through Sunday.
        let from = utc(2026, 8, 10, 0, 0);
        let calendar = StaticCalendarBackend::weekday_fixture(from, 7, Tz::UTC);

        let busy = calendar
            .get_busy_intervals(from, utc(2026, 8, 17, 0, 0))
            .await
            .expect("fixture busy query");
        // 5 weekdays x 2 meetings + the Friday flight (event + interval dedup
        // keeps the flight once).
        assert_eq!(busy.len(), 11);

        let flight = calendar
            .find_event_by_name("my flight that leaves friday", from, utc(2026, 8, 17, 0, 0))
            .await
            .expect("fixture event query")
            .expect("flight should be found");
        assert_eq!(flight.start, utc(2026, 8, 14, 18, 0));
    }

    #[tokio::test]
    async fn created_events_become_busy_and_searchable() {
        let calendar = StaticCalendarBackend::empty();
        let start = utc(2026, 8, 12, 9, 0);
        let end = utc(2026, 8, 12, 9, 45);

        let event_id = calendar
            .create_event("Design review", start, end, "", &[])
            .await
            .expect("create should succeed")
            .expect("static backend always assigns an id");
        assert!(!event_id.is_empty());

        let busy = calendar
            .get_busy_intervals(utc(2026, 8, 12, 0, 0), utc(2026, 8, 13, 0, 0))
            .await
            .expect("busy query");
        assert_eq!(busy, vec![BusyInterval { start, end }]);

        let found = calendar
            .find_event_by_name("design", utc(2026, 8, 12, 0, 0), utc(2026, 8, 13, 0, 0))
            .await
            .expect("search")
            .expect("created event should be searchable");
        assert_eq!(found.summary, "Design review");
    }

    #[tokio::test]
    async fn event_search_misses_return_none_not_errors() {
        let calendar = StaticCalendarBackend::empty();
        let found = calendar
            .find_event_by_name("dentist", utc(2026, 8, 10, 0, 0), utc(2026, 8, 20, 0, 0))
            .await
            .expect("search should not error");
        assert!(found.is_none());
    }

    #[test]
    fn local_instant_resolves_in_timezone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 10).unwrap();
        let instant = local_instant(tz, date, 9, 0).unwrap();
        // EDT is UTC-4 in August.
        assert_eq!(instant, utc(2026, 8, 10, 13, 0));
    }
}
