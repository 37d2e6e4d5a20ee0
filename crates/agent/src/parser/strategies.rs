use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use slotwise_core::domain::calendar::{local_instant, CalendarBackend};
use slotwise_core::{ConstraintSet, SlotConstraint};

use crate::parser::duration::DurationPatterns;
use crate::parser::grammar::{weekday_from_name, DateTimeGrammar};
use crate::parser::TimeIntent;

/// How a weekday mention was qualified in the utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeekdayQualifier {
    /// "tuesday" - the next natural occurrence.
    Bare,
    /// "this tuesday" - also the next natural occurrence.
    This,
    /// "next tuesday" - the occurrence in the week after the current one.
    Next,
}

/// Days from `today` to the requested weekday, always positive.
///
/// Bare and "this" mentions resolve to the next natural occurrence. "next"
/// always lands in the week after the current one: said on a Wednesday,
/// "next Tuesday" is 6 days out and "next Friday" is 9.
pub fn resolve_weekday(today: Weekday, target: Weekday, qualifier: WeekdayQualifier) -> i64 {
    let today_index = i64::from(today.num_days_from_monday());
    let target_index = i64::from(target.num_days_from_monday());

    match qualifier {
        WeekdayQualifier::Bare | WeekdayQualifier::This => {
            let mut offset = target_index - today_index;
            if offset <= 0 {
                offset += 7;
            }
            offset
        }
        WeekdayQualifier::Next => 7 - today_index + target_index,
    }
}

/// Time-of-day words shared by the relative and constraint strategies.
pub(crate) fn time_of_day_range(text: &str) -> Option<(u32, u32)> {
    [("morning", (6, 12)), ("afternoon", (12, 18)), ("evening", (18, 22)), ("night", (22, 6))]
        .into_iter()
        .find(|(word, _)| text.contains(word))
        .map(|(_, range)| range)
}

// ---------------------------------------------------------------------------
// Relative-calendar strategy
// ---------------------------------------------------------------------------

pub(crate) struct RelativeStrategy {
    qualified: Regex,
    counted: Regex,
}

impl RelativeStrategy {
    pub(crate) fn new() -> Self {
        Self {
            qualified: Regex::new(
                r"\b(next|this)\s+(week|month|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            )
            .expect("static regex"),
            counted: Regex::new(
                r"\b(\d+)\s+(days?|weeks?|months?)\s+(from now|later|after|before)\b",
            )
            .expect("static regex"),
        }
    }

    pub(crate) fn parse(&self, text: &str, now: DateTime<Utc>, tz: Tz) -> TimeIntent {
        if let Some(caps) = self.qualified.captures(text) {
            let qualifier = match &caps[1] {
                "next" => WeekdayQualifier::Next,
                _ => WeekdayQualifier::This,
            };

            let window = match &caps[2] {
                "week" => {
                    let start = if qualifier == WeekdayQualifier::Next {
                        now + Duration::weeks(1)
                    } else {
                        now
                    };
                    Some((start, start + Duration::days(7)))
                }
                "month" => {
                    let months = if qualifier == WeekdayQualifier::Next { 1 } else { 0 };
                    now.checked_add_months(Months::new(months)).and_then(|start| {
                        start.checked_add_months(Months::new(1)).map(|end| (start, end))
                    })
                }
                day => weekday_from_name(day).map(|target| {
                    let today = now.with_timezone(&tz).weekday();
                    let offset = resolve_weekday(today, target, qualifier);
                    let start = now + Duration::days(offset);
                    (start, start + Duration::hours(8))
                }),
            };

            if let Some((start, end)) = window {
                let mut constraints = ConstraintSet::new();
                if let Some((start_hour, end_hour)) = time_of_day_range(text) {
                    constraints.insert(SlotConstraint::TimeRange { start_hour, end_hour });
                }
                return TimeIntent {
                    start: Some(start),
                    end: Some(end),
                    constraints,
                    confidence: 0.8,
                    ..TimeIntent::default()
                };
            }
        }

        if let Some(caps) = self.counted.captures(text) {
            let amount: i64 = match caps[1].parse() {
                Ok(value) => value,
                Err(_) => return TimeIntent::no_match(),
            };
            let unit = caps[2].trim_end_matches('s').to_string();
            let backwards = &caps[3] == "before";

            let start = match unit.as_str() {
                "day" => Some(shift(now, Duration::days(amount), backwards)),
                "week" => Some(shift(now, Duration::weeks(amount), backwards)),
                "month" => {
                    let months = Months::new(amount.unsigned_abs() as u32);
                    if backwards {
                        now.checked_sub_months(months)
                    } else {
                        now.checked_add_months(months)
                    }
                }
                _ => None,
            };

            if let Some(start) = start {
                return TimeIntent {
                    start: Some(start),
                    end: Some(start + Duration::hours(8)),
                    confidence: 0.8,
                    ..TimeIntent::default()
                };
            }
        }

        TimeIntent::no_match()
    }
}

fn shift(now: DateTime<Utc>, delta: Duration, backwards: bool) -> DateTime<Utc> {
    if backwards {
        now - delta
    } else {
        now + delta
    }
}

// ---------------------------------------------------------------------------
// Contextual (event-anchored) strategy
// ---------------------------------------------------------------------------

const EVENT_SAFETY_BUFFER_MINUTES: i64 = 15;

pub(crate) struct ContextualStrategy {
    anchored: Regex,
    bare: Regex,
}

impl ContextualStrategy {
    pub(crate) fn new() -> Self {
        Self {
            anchored: Regex::new(
                r"\b(\d+)\s*(minutes?|mins?|hours?|hrs?)\s+(before|after)\s+(.+)",
            )
            .expect("static regex"),
            bare: Regex::new(r"\b(before|after)\s+(my\s+|the\s+)?(.+)").expect("static regex"),
        }
    }

    pub(crate) async fn parse(
        &self,
        text: &str,
        now: DateTime<Utc>,
        tz: Tz,
        calendar: &dyn CalendarBackend,
    ) -> TimeIntent {
        let (delta, backwards, description, anchored) =
            if let Some(caps) = self.anchored.captures(text) {
                let amount: i64 = caps[1].parse().unwrap_or(1);
                let delta = if caps[2].starts_with('h') {
                    Duration::hours(amount)
                } else {
                    Duration::minutes(amount)
                };
                (delta, &caps[3] == "before", clean_event_description(&caps[4]), true)
            } else if let Some(caps) = self.bare.captures(text) {
                (Duration::hours(1), &caps[1] == "before", clean_event_description(&caps[3]), false)
            } else {
                return TimeIntent::no_match();
            };

        if description.is_empty() {
            return TimeIntent::no_match();
        }

        let search_start = now - Duration::days(30);
        let search_end = now + Duration::days(30);
        let lookup = calendar.find_event_by_name(&description, search_start, search_end).await;

        match lookup {
            Ok(Some(event)) => {
                let safety = Duration::minutes(EVENT_SAFETY_BUFFER_MINUTES);
                let (start, end) = if backwards {
                    let end = event.start - safety;
                    (end - delta, end)
                } else {
                    let start = (event.end + delta).max(event.end + safety);
                    (start, start + Duration::hours(2))
                };

                let mut constraints = ConstraintSet::new();
                constraints
                    .insert(SlotConstraint::ReferenceEvent { summary: event.summary.clone() });

                TimeIntent {
                    start: Some(start),
                    end: Some(end),
                    constraints,
                    confidence: 0.9,
                    ..TimeIntent::default()
                }
            }
            Ok(None) if anchored => TimeIntent::ask(
                format!(
                    "I couldn't find the event '{description}' in your calendar. Could you \
                     provide more details or a different time reference?"
                ),
                0.3,
            ),
            Err(_) if anchored => TimeIntent::ask(
                format!(
                    "I couldn't reach your calendar to look up '{description}'. Could you give \
                     me a concrete day and time instead?"
                ),
                0.3,
            ),
            // A weak "before/after X" that resolves to nothing is not worth a
            // clarification; later strategies get their chance.
            _ => TimeIntent::no_match(),
        }
    }
}

fn clean_event_description(raw: &str) -> String {
    let mut description = raw.trim().trim_end_matches(['.', '?', '!']).to_string();
    for prefix in ["my ", "the "] {
        if let Some(stripped) = description.strip_prefix(prefix) {
            description = stripped.to_string();
        }
    }
    description
}

// ---------------------------------------------------------------------------
// Deadline strategy
// ---------------------------------------------------------------------------

const DEADLINE_BUFFER_MINUTES: i64 = 30;
const DEADLINE_WINDOW_HOURS: i64 = 8;

pub(crate) struct DeadlineStrategy {
    duration_before: Regex,
    weekday: Regex,
}

impl DeadlineStrategy {
    pub(crate) fn new() -> Self {
        Self {
            duration_before: Regex::new(r"\b(\d+)\s*(minutes?|mins?|hours?|hrs?)\s+before\b")
                .expect("static regex"),
            weekday: Regex::new(
                r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            )
            .expect("static regex"),
        }
    }

    /// The deadline path only engages when the utterance pins the boundary
    /// to an explicit weekday and clock time.
    pub(crate) fn applies(&self, text: &str, grammar: &DateTimeGrammar) -> bool {
        text.contains("before")
            && self.weekday.is_match(text)
            && grammar.parse_clock_time(text).is_some()
    }

    pub(crate) fn parse(
        &self,
        text: &str,
        now: DateTime<Utc>,
        tz: Tz,
        grammar: &DateTimeGrammar,
        durations: &DurationPatterns,
    ) -> TimeIntent {
        let (target, time) = match (
            self.weekday.captures(text).and_then(|caps| weekday_from_name(&caps[1])),
            grammar.parse_clock_time(text),
        ) {
            (Some(target), Some(time)) => (target, time),
            _ => return TimeIntent::no_match(),
        };

        let qualifier = if text.contains("next") {
            WeekdayQualifier::Next
        } else {
            WeekdayQualifier::Bare
        };
        let local_now = now.with_timezone(&tz);
        let offset = resolve_weekday(local_now.weekday(), target, qualifier);
        let deadline_date = local_now.date_naive() + Duration::days(offset);

        let Some(deadline) = instant_at(tz, deadline_date, time) else {
            return TimeIntent::no_match();
        };

        let duration_minutes = self
            .duration_before
            .captures(text)
            .and_then(|caps| {
                let amount: i64 = caps[1].parse().ok()?;
                Some(if caps[2].starts_with('h') { amount * 60 } else { amount })
            })
            .or_else(|| durations.parse(text));

        let must_end_before = deadline - Duration::minutes(DEADLINE_BUFFER_MINUTES);
        let window_start = must_end_before - Duration::hours(DEADLINE_WINDOW_HOURS);

        let mut constraints = ConstraintSet::new();
        constraints.insert(SlotConstraint::Deadline { at: deadline });
        constraints.insert(SlotConstraint::MustEndBefore { at: must_end_before });

        TimeIntent {
            start: Some(window_start),
            end: Some(must_end_before),
            duration_minutes,
            constraints,
            confidence: 0.9,
            ..TimeIntent::default()
        }
    }
}

fn instant_at(tz: Tz, date: NaiveDate, time: chrono::NaiveTime) -> Option<DateTime<Utc>> {
    use chrono::Timelike;
    local_instant(tz, date, time.hour(), time.minute())
}

// ---------------------------------------------------------------------------
// Constraint-only strategy
// ---------------------------------------------------------------------------

pub(crate) struct ConstraintStrategy {
    not_on: Regex,
}

impl ConstraintStrategy {
    pub(crate) fn new() -> Self {
        Self {
            not_on: Regex::new(
                r"\bnot\s+(?:on\s+)?((?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?(?:\s*(?:,|or|and)\s*(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)s?)*)",
            )
            .expect("static regex"),
        }
    }

    pub(crate) fn parse(&self, text: &str, now: DateTime<Utc>) -> TimeIntent {
        let mut constraints = ConstraintSet::new();
        let mut matched = 0usize;

        if let Some((start_hour, end_hour)) = time_of_day_range(text) {
            constraints.insert(SlotConstraint::TimeRange { start_hour, end_hour });
            matched += 1;
        }

        if text.contains("too early") {
            constraints.insert(SlotConstraint::NotBefore { hour: 9 });
            matched += 1;
        }
        if text.contains("too late") {
            constraints.insert(SlotConstraint::NotAfter { hour: 18 });
            matched += 1;
        }

        if text.contains("weekend") {
            constraints.insert(SlotConstraint::WeekendsOnly);
            matched += 1;
        } else if text.contains("weekday") {
            constraints.insert(SlotConstraint::WeekdaysOnly);
            matched += 1;
        }

        if let Some(caps) = self.not_on.captures(text) {
            let days: Vec<Weekday> = caps[1]
                .split(|c: char| !c.is_ascii_alphabetic())
                .filter_map(|word| weekday_from_name(word.trim_end_matches('s')))
                .collect();
            if !days.is_empty() {
                constraints.insert(SlotConstraint::ExcludedDays { days });
                matched += 1;
            }
        }

        if constraints.is_empty() {
            return TimeIntent::no_match();
        }

        let start = now + Duration::hours(1);
        TimeIntent {
            start: Some(start),
            end: Some(start + Duration::days(7)),
            constraints,
            confidence: (0.5 + 0.05 * matched as f64).min(0.6),
            ..TimeIntent::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Specific-date strategy
// ---------------------------------------------------------------------------

pub(crate) struct SpecificStrategy;

impl SpecificStrategy {
    pub(crate) fn parse(
        &self,
        text: &str,
        now: DateTime<Utc>,
        tz: Tz,
        grammar: &DateTimeGrammar,
    ) -> TimeIntent {
        let local_today = now.with_timezone(&tz).date_naive();

        let date = if text.contains("today") {
            Some(local_today)
        } else if text.contains("tomorrow") {
            local_today.succ_opt()
        } else {
            grammar.parse_date(text, local_today)
        };

        let Some(date) = date else {
            return TimeIntent::no_match();
        };

        let intent = match grammar.parse_clock_time(text) {
            Some(time) => {
                use chrono::Timelike;
                local_instant(tz, date, time.hour(), time.minute()).map(|start| TimeIntent {
                    start: Some(start),
                    end: Some(start + Duration::hours(1)),
                    confidence: 0.7,
                    ..TimeIntent::default()
                })
            }
            // Date without a time: assume business hours.
            None => match (local_instant(tz, date, 9, 0), local_instant(tz, date, 17, 0)) {
                (Some(start), Some(end)) => Some(TimeIntent {
                    start: Some(start),
                    end: Some(end),
                    confidence: 0.7,
                    ..TimeIntent::default()
                }),
                _ => None,
            },
        };

        intent.unwrap_or_else(TimeIntent::no_match)
    }
}
