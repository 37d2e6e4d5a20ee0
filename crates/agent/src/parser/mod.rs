pub mod duration;
pub mod grammar;
mod strategies;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::debug;

use slotwise_core::{CalendarBackend, ConstraintSet};

use crate::parser::duration::DurationPatterns;
use crate::parser::grammar::DateTimeGrammar;
use crate::parser::strategies::{
    ConstraintStrategy, ContextualStrategy, DeadlineStrategy, RelativeStrategy, SpecificStrategy,
};

pub use crate::parser::strategies::{resolve_weekday, WeekdayQualifier};

/// A structured, scored reading of a natural-language time expression.
/// Exactly one strategy produces the final value per `parse` call, and a
/// value is never revised after it is returned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeIntent {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub constraints: ConstraintSet,
    pub confidence: f64,
    pub needs_clarification: bool,
    pub clarification: String,
}

impl TimeIntent {
    pub fn no_match() -> Self {
        Self::default()
    }

    pub fn ask(clarification: impl Into<String>, confidence: f64) -> Self {
        Self {
            needs_clarification: true,
            clarification: clarification.into(),
            confidence,
            ..Self::default()
        }
    }

    /// The search window, when the intent pinned one down.
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }
}

/// Result of reading a whole scheduling request in one pass: duration and
/// time preference extracted together, with clarification questions queued
/// for whatever is missing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComplexRequest {
    pub duration_minutes: Option<i64>,
    pub time: Option<TimeIntent>,
    pub clarifications: Vec<String>,
}

impl ComplexRequest {
    pub fn needs_clarification(&self) -> bool {
        !self.clarifications.is_empty()
    }
}

const RELATIVE_THRESHOLD: f64 = 0.7;
const DEADLINE_THRESHOLD: f64 = 0.7;
const CONTEXTUAL_THRESHOLD: f64 = 0.7;
const CONSTRAINT_THRESHOLD: f64 = 0.5;
const SPECIFIC_THRESHOLD: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.4;

/// Fixed-priority cascade of parsing strategies. Each strategy scores its
/// own reading; the first score above its threshold wins. Strategies never
/// raise: a failed read degrades confidence and the cascade moves on.
pub struct TemporalParser {
    calendar: Arc<dyn CalendarBackend>,
    grammar: DateTimeGrammar,
    durations: DurationPatterns,
    relative: RelativeStrategy,
    contextual: ContextualStrategy,
    deadline: DeadlineStrategy,
    constraint: ConstraintStrategy,
    specific: SpecificStrategy,
}

impl TemporalParser {
    pub fn new(calendar: Arc<dyn CalendarBackend>) -> Self {
        Self {
            calendar,
            grammar: DateTimeGrammar::new(),
            durations: DurationPatterns::new(),
            relative: RelativeStrategy::new(),
            contextual: ContextualStrategy::new(),
            deadline: DeadlineStrategy::new(),
            constraint: ConstraintStrategy::new(),
            specific: SpecificStrategy,
        }
    }

    pub async fn parse(&self, text: &str, now: DateTime<Utc>, tz: Tz) -> TimeIntent {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return self.reask();
        }

        let intent = self.relative.parse(&text, now, tz);
        if intent.confidence > RELATIVE_THRESHOLD {
            debug!(strategy = "relative", confidence = intent.confidence, "time parsed");
            return intent;
        }

        // The deadline path has its own, more specific entry condition and
        // therefore runs before the event lookup: a phrase that names an
        // absolute day and time needs no calendar search.
        if self.deadline.applies(&text, &self.grammar) {
            let intent = self.deadline.parse(&text, now, tz, &self.grammar, &self.durations);
            if intent.confidence > DEADLINE_THRESHOLD {
                debug!(strategy = "deadline", confidence = intent.confidence, "time parsed");
                return intent;
            }
        }

        let intent = self.contextual.parse(&text, now, tz, self.calendar.as_ref()).await;
        if intent.confidence > CONTEXTUAL_THRESHOLD || intent.needs_clarification {
            debug!(strategy = "contextual", confidence = intent.confidence, "time parsed");
            return intent;
        }

        let intent = self.constraint.parse(&text, now);
        if intent.confidence > CONSTRAINT_THRESHOLD {
            debug!(strategy = "constraint", confidence = intent.confidence, "time parsed");
            return intent;
        }

        let intent = self.specific.parse(&text, now, tz, &self.grammar);
        if intent.confidence > SPECIFIC_THRESHOLD {
            debug!(strategy = "specific", confidence = intent.confidence, "time parsed");
            return intent;
        }

        self.fallback(&text, now, tz)
    }

    /// Extract a meeting duration in minutes from free text.
    pub fn parse_duration(&self, text: &str) -> Option<i64> {
        self.durations.parse(&text.to_lowercase())
    }

    /// Read a whole scheduling request in one pass, collecting a
    /// clarification question for each missing piece.
    pub async fn parse_complex_request(
        &self,
        text: &str,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> ComplexRequest {
        let mut request = ComplexRequest::default();

        match self.parse_duration(text) {
            Some(minutes) => request.duration_minutes = Some(minutes),
            None => request.clarifications.push("How long should the meeting be?".to_string()),
        }

        let intent = self.parse(text, now, tz).await;
        if intent.confidence > CONSTRAINT_THRESHOLD {
            request.time = Some(intent);
        } else if intent.needs_clarification {
            request.clarifications.push(intent.clarification.clone());
        } else {
            request
                .clarifications
                .push("When would you like to schedule the meeting?".to_string());
        }

        request
    }

    /// Last chance: a bare clock time resolves to its next occurrence with
    /// low confidence; anything else asks the user to rephrase.
    fn fallback(&self, text: &str, now: DateTime<Utc>, tz: Tz) -> TimeIntent {
        use chrono::Timelike;

        if let Some(time) = self.grammar.parse_clock_time(text) {
            let local_now = now.with_timezone(&tz);
            let date = if time > local_now.time() {
                Some(local_now.date_naive())
            } else {
                local_now.date_naive().succ_opt()
            };
            if let Some(start) = date.and_then(|d| {
                slotwise_core::domain::calendar::local_instant(tz, d, time.hour(), time.minute())
            }) {
                return TimeIntent {
                    start: Some(start),
                    end: Some(start + Duration::hours(1)),
                    confidence: FALLBACK_CONFIDENCE,
                    ..TimeIntent::default()
                };
            }
        }

        self.reask()
    }

    fn reask(&self) -> TimeIntent {
        TimeIntent::ask(
            "I couldn't understand the time you mentioned. Could you please specify it \
             differently?",
            0.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Datelike, Duration, TimeZone, Utc, Weekday};
    use chrono_tz::Tz;

    use slotwise_core::{SlotConstraint, StaticCalendarBackend};

    use super::strategies::{resolve_weekday, WeekdayQualifier};
    use super::TemporalParser;

    fn parser() -> TemporalParser {
        TemporalParser::new(Arc::new(StaticCalendarBackend::empty()))
    }

    fn fixture_parser(now: chrono::DateTime<Utc>) -> TemporalParser {
        TemporalParser::new(Arc::new(StaticCalendarBackend::weekday_fixture(now, 7, Tz::UTC)))
    }

    fn wednesday() -> chrono::DateTime<Utc> {
        // 2026-08-12 is a Wednesday.
        Utc.with_ymd_and_hms(2026, 8, 12, 15, 0, 0).unwrap()
    }

    #[test]
    fn next_weekday_always_lands_in_the_following_week() {
        // Spoken on a Wednesday.
        assert_eq!(resolve_weekday(Weekday::Wed, Weekday::Tue, WeekdayQualifier::Next), 6);
        assert_eq!(resolve_weekday(Weekday::Wed, Weekday::Fri, WeekdayQualifier::Next), 9);
        assert_eq!(resolve_weekday(Weekday::Wed, Weekday::Wed, WeekdayQualifier::Next), 7);
        // Bare and "this" take the next natural occurrence.
        assert_eq!(resolve_weekday(Weekday::Wed, Weekday::Fri, WeekdayQualifier::Bare), 2);
        assert_eq!(resolve_weekday(Weekday::Wed, Weekday::Tue, WeekdayQualifier::This), 6);
        assert_eq!(resolve_weekday(Weekday::Mon, Weekday::Mon, WeekdayQualifier::Bare), 7);

        for today in [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri] {
            for target in [Weekday::Mon, Weekday::Wed, Weekday::Sun] {
                for qualifier in
                    [WeekdayQualifier::Bare, WeekdayQualifier::This, WeekdayQualifier::Next]
                {
                    let offset = resolve_weekday(today, target, qualifier);
                    assert!((1..=13).contains(&offset), "offset {offset} out of range");
                }
            }
        }
    }

    #[tokio::test]
    async fn next_tuesday_on_a_wednesday_is_six_days_out() {
        let intent = parser().parse("next Tuesday", wednesday(), Tz::UTC).await;

        let start = intent.start.expect("resolved start");
        assert_eq!(start.date_naive(), chrono::NaiveDate::from_ymd_opt(2026, 8, 18).unwrap());
        assert!(intent.confidence >= 0.8);
        assert!(!intent.needs_clarification);
    }

    #[tokio::test]
    async fn next_tuesday_afternoon_keeps_the_time_of_day_constraint() {
        let intent = parser().parse("next Tuesday afternoon", wednesday(), Tz::UTC).await;

        assert!(intent.confidence >= 0.8);
        assert_eq!(intent.constraints.time_range(), Some((12, 18)));
    }

    #[tokio::test]
    async fn counted_offsets_resolve_forwards_and_backwards() {
        let now = wednesday();
        let parser = parser();

        let ahead = parser.parse("3 days from now", now, Tz::UTC).await;
        assert_eq!(ahead.start, Some(now + Duration::days(3)));
        assert!(ahead.confidence >= 0.8);

        let behind = parser.parse("2 weeks before", now, Tz::UTC).await;
        assert_eq!(behind.start, Some(now - Duration::weeks(2)));
    }

    #[tokio::test]
    async fn afternoon_alone_yields_constraints_and_a_default_window() {
        let now = wednesday();
        let intent = parser().parse("afternoon", now, Tz::UTC).await;

        assert_eq!(intent.constraints.time_range(), Some((12, 18)));
        assert!((0.5..=0.6).contains(&intent.confidence));
        assert_eq!(intent.start, Some(now + Duration::hours(1)));
        assert_eq!(intent.end, Some(now + Duration::hours(1) + Duration::days(7)));
    }

    #[tokio::test]
    async fn constraint_strategy_collects_exclusions_and_bounds() {
        let intent =
            parser().parse("weekdays please, not too early and not on friday", wednesday(), Tz::UTC).await;

        assert!(intent.confidence > 0.5);
        let mut has_weekdays = false;
        let mut has_not_before = false;
        let mut excluded = Vec::new();
        for constraint in intent.constraints.iter() {
            match constraint {
                SlotConstraint::WeekdaysOnly => has_weekdays = true,
                SlotConstraint::NotBefore { hour } => has_not_before = *hour == 9,
                SlotConstraint::ExcludedDays { days } => excluded = days.clone(),
                _ => {}
            }
        }
        assert!(has_weekdays);
        assert!(has_not_before);
        assert_eq!(excluded, vec![Weekday::Fri]);
    }

    #[tokio::test]
    async fn deadline_phrase_resolves_window_and_duration() {
        // Monday morning; the flight leaves Friday 18:00.
        let now = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        let intent = parser()
            .parse("45 minutes before my flight that leaves Friday at 6 PM", now, Tz::UTC)
            .await;

        assert!(intent.confidence >= 0.9);
        assert_eq!(intent.duration_minutes, Some(45));

        let must_end_before = Utc.with_ymd_and_hms(2026, 8, 14, 17, 30, 0).unwrap();
        assert_eq!(intent.constraints.must_end_before(), Some(must_end_before));
        assert_eq!(
            intent.constraints.deadline(),
            Some(Utc.with_ymd_and_hms(2026, 8, 14, 18, 0, 0).unwrap())
        );
        assert_eq!(intent.start, Some(Utc.with_ymd_and_hms(2026, 8, 14, 9, 30, 0).unwrap()));
        assert_eq!(intent.end, Some(must_end_before));
    }

    #[tokio::test]
    async fn event_anchored_phrase_pads_away_from_the_event() {
        let now = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        let intent = fixture_parser(now).parse("30 minutes before my flight", now, Tz::UTC).await;

        assert!(intent.confidence >= 0.9);
        // Flight starts Friday 18:00; window ends 15 minutes before it.
        assert_eq!(intent.end, Some(Utc.with_ymd_and_hms(2026, 8, 14, 17, 45, 0).unwrap()));
        assert_eq!(intent.start, Some(Utc.with_ymd_and_hms(2026, 8, 14, 17, 15, 0).unwrap()));
        assert_eq!(intent.constraints.reference_event(), Some("Flight to Denver"));
    }

    #[tokio::test]
    async fn missing_reference_event_asks_for_clarification() {
        let intent = parser().parse("30 minutes before my flight", wednesday(), Tz::UTC).await;

        assert!(intent.needs_clarification);
        assert!(intent.clarification.contains("flight"));
        assert!(intent.confidence < 0.5);
    }

    #[tokio::test]
    async fn specific_dates_without_a_time_assume_business_hours() {
        let intent = parser().parse("tomorrow", wednesday(), Tz::UTC).await;

        assert_eq!(intent.start, Some(Utc.with_ymd_and_hms(2026, 8, 13, 9, 0, 0).unwrap()));
        assert_eq!(intent.end, Some(Utc.with_ymd_and_hms(2026, 8, 13, 17, 0, 0).unwrap()));
        assert!(intent.confidence >= 0.7);
    }

    #[tokio::test]
    async fn specific_date_with_time_gets_a_one_hour_window() {
        let intent = parser().parse("tomorrow at 3 pm", wednesday(), Tz::UTC).await;

        assert_eq!(intent.start, Some(Utc.with_ymd_and_hms(2026, 8, 13, 15, 0, 0).unwrap()));
        assert_eq!(intent.end, Some(Utc.with_ymd_and_hms(2026, 8, 13, 16, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn bare_clock_time_falls_back_with_low_confidence() {
        // 17:00 is still ahead of the 15:00 reference, so it stays today.
        let intent = parser().parse("5 pm", wednesday(), Tz::UTC).await;

        assert_eq!(intent.start, Some(Utc.with_ymd_and_hms(2026, 8, 12, 17, 0, 0).unwrap()));
        assert!((intent.confidence - 0.4).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn unparseable_text_asks_to_rephrase_with_zero_confidence() {
        let intent = parser().parse("whenever the vibes align", wednesday(), Tz::UTC).await;

        assert!(intent.needs_clarification);
        assert_eq!(intent.confidence, 0.0);
        assert!(!intent.clarification.is_empty());
    }

    #[tokio::test]
    async fn confidence_is_always_within_bounds() {
        let now = wednesday();
        let parser = fixture_parser(now);
        let samples = [
            "next tuesday",
            "this week",
            "2 months from now",
            "45 minutes before my flight that leaves friday at 6 pm",
            "30 minutes before my flight",
            "afternoon",
            "weekend mornings",
            "tomorrow at noon",
            "august 20th",
            "3 pm",
            "gibberish input",
            "",
        ];

        for text in samples {
            let intent = parser.parse(text, now, Tz::UTC).await;
            assert!(
                (0.0..=1.0).contains(&intent.confidence),
                "confidence out of bounds for `{text}`"
            );
        }
    }

    #[tokio::test]
    async fn complex_request_extracts_duration_and_time_together() {
        let parser = parser();
        let full = parser
            .parse_complex_request(
                "I need to schedule a 30-minute meeting for next Tuesday afternoon",
                wednesday(),
                Tz::UTC,
            )
            .await;

        assert_eq!(full.duration_minutes, Some(30));
        assert!(full.time.is_some());
        assert!(!full.needs_clarification());

        let partial = parser.parse_complex_request("we should meet", wednesday(), Tz::UTC).await;
        assert!(partial.needs_clarification());
        assert_eq!(partial.clarifications.len(), 2);
    }

    #[tokio::test]
    async fn weekday_reference_uses_the_configured_timezone() {
        // 2026-08-13 01:00 UTC is still Wednesday evening in Chicago, so
        // "friday" should resolve relative to Wednesday there.
        let now = Utc.with_ymd_and_hms(2026, 8, 13, 1, 0, 0).unwrap();
        let tz: Tz = "America/Chicago".parse().unwrap();
        let intent = parser().parse("friday", now, tz).await;

        let start = intent.start.expect("resolved start");
        assert_eq!(start.with_timezone(&tz).date_naive().weekday(), Weekday::Fri);
        assert_eq!(
            start.with_timezone(&tz).date_naive(),
            chrono::NaiveDate::from_ymd_opt(2026, 8, 14).unwrap()
        );
    }
}
