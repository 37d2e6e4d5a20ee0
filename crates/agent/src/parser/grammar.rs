use chrono::{NaiveDate, NaiveTime, Weekday};
use regex::Regex;

/// A date and/or time recovered from free text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GrammarMatch {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

impl GrammarMatch {
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.time.is_none()
    }
}

/// Small hand-rolled date/time grammar.
///
/// Covers the shapes people actually say to a scheduler: ISO dates,
/// month-name dates ("August 14th"), numeric dates ("8/14/2026"), weekday
/// names, 12-hour and 24-hour clock times, noon and midnight. Anything
/// fancier belongs to the strategy layer above.
pub struct DateTimeGrammar {
    iso_date: Regex,
    month_date: Regex,
    numeric_date: Regex,
    weekday: Regex,
    clock_12h: Regex,
    clock_24h: Regex,
    named_time: Regex,
}

const MONTHS: [(&str, u32); 12] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

impl Default for DateTimeGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl DateTimeGrammar {
    pub fn new() -> Self {
        Self {
            iso_date: Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("static regex"),
            month_date: Regex::new(
                r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\.?\s+(\d{1,2})(?:st|nd|rd|th)?(?:,?\s*(\d{4}))?\b",
            )
            .expect("static regex"),
            numeric_date: Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{2,4})\b").expect("static regex"),
            weekday: Regex::new(
                r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            )
            .expect("static regex"),
            clock_12h: Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm|a\.m\.|p\.m\.)\b")
                .expect("static regex"),
            clock_24h: Regex::new(r"\b(\d{1,2}):(\d{2})\b").expect("static regex"),
            // Word-bounded so "afternoon" does not read as noon.
            named_time: Regex::new(r"(?i)\b(noon|midday|midnight)\b").expect("static regex"),
        }
    }

    /// Parse the first date and time found in `text`, resolving relative
    /// pieces (weekday names, year-less dates) forward from `reference`.
    pub fn parse(&self, text: &str, reference: NaiveDate) -> GrammarMatch {
        GrammarMatch { date: self.parse_date(text, reference), time: self.parse_clock_time(text) }
    }

    pub fn parse_date(&self, text: &str, reference: NaiveDate) -> Option<NaiveDate> {
        if let Some(caps) = self.iso_date.captures(text) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }

        if let Some(caps) = self.month_date.captures(text) {
            let month = month_number(&caps[1])?;
            let day: u32 = caps[2].parse().ok()?;
            let explicit_year: Option<i32> = caps.get(3).and_then(|m| m.as_str().parse().ok());
            let year = explicit_year.unwrap_or_else(|| reference_year(reference));
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                // A year-less date that already passed means the next one.
                if explicit_year.is_none() && date < reference {
                    return NaiveDate::from_ymd_opt(year + 1, month, day);
                }
                return Some(date);
            }
        }

        if let Some(caps) = self.numeric_date.captures(text) {
            let month: u32 = caps[1].parse().ok()?;
            let day: u32 = caps[2].parse().ok()?;
            let mut year: i32 = caps[3].parse().ok()?;
            if year < 100 {
                year += 2000;
            }
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date);
            }
        }

        if let Some(caps) = self.weekday.captures(text) {
            let target = weekday_from_name(&caps[1])?;
            return Some(next_occurrence(reference, target));
        }

        None
    }

    pub fn parse_clock_time(&self, text: &str) -> Option<NaiveTime> {
        if let Some(caps) = self.named_time.captures(text) {
            return match caps[1].to_ascii_lowercase().as_str() {
                "midnight" => NaiveTime::from_hms_opt(0, 0, 0),
                _ => NaiveTime::from_hms_opt(12, 0, 0),
            };
        }

        if let Some(caps) = self.clock_12h.captures(text) {
            let mut hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
            if hour > 12 || minute > 59 {
                return None;
            }
            let meridiem = caps[3].to_ascii_lowercase();
            if meridiem.starts_with('p') && hour != 12 {
                hour += 12;
            } else if meridiem.starts_with('a') && hour == 12 {
                hour = 0;
            }
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }

        if let Some(caps) = self.clock_24h.captures(text) {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps[2].parse().ok()?;
            if hour < 24 && minute < 60 {
                return NaiveTime::from_hms_opt(hour, minute, 0);
            }
        }

        None
    }
}

pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Next natural occurrence of `target` strictly after `reference`.
pub fn next_occurrence(reference: NaiveDate, target: Weekday) -> NaiveDate {
    use chrono::Datelike;

    let today = reference.weekday().num_days_from_monday() as i64;
    let wanted = target.num_days_from_monday() as i64;
    let mut offset = wanted - today;
    if offset <= 0 {
        offset += 7;
    }
    reference + chrono::Duration::days(offset)
}

fn reference_year(reference: NaiveDate) -> i32 {
    use chrono::Datelike;
    reference.year()
}

fn month_number(name: &str) -> Option<u32> {
    let lowered = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .find(|(month, _)| month.starts_with(lowered.trim_end_matches('.')))
        .map(|(_, number)| *number)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, Weekday};

    use super::{next_occurrence, DateTimeGrammar};

    fn reference() -> NaiveDate {
        // A Wednesday.
        NaiveDate::from_ymd_opt(2026, 8, 12).unwrap()
    }

    #[test]
    fn parses_iso_and_numeric_dates() {
        let grammar = DateTimeGrammar::new();
        assert_eq!(
            grammar.parse_date("let's do 2026-09-03", reference()),
            NaiveDate::from_ymd_opt(2026, 9, 3)
        );
        assert_eq!(
            grammar.parse_date("how about 9/3/2026?", reference()),
            NaiveDate::from_ymd_opt(2026, 9, 3)
        );
        assert_eq!(
            grammar.parse_date("how about 9/3/26?", reference()),
            NaiveDate::from_ymd_opt(2026, 9, 3)
        );
    }

    #[test]
    fn parses_month_name_dates_with_ordinals() {
        let grammar = DateTimeGrammar::new();
        assert_eq!(
            grammar.parse_date("september 3rd works", reference()),
            NaiveDate::from_ymd_opt(2026, 9, 3)
        );
        assert_eq!(
            grammar.parse_date("August 20, 2027", reference()),
            NaiveDate::from_ymd_opt(2027, 8, 20)
        );
    }

    #[test]
    fn year_less_past_dates_roll_to_next_year() {
        let grammar = DateTimeGrammar::new();
        assert_eq!(
            grammar.parse_date("january 5", reference()),
            NaiveDate::from_ymd_opt(2027, 1, 5)
        );
    }

    #[test]
    fn weekday_names_resolve_to_the_next_occurrence() {
        let grammar = DateTimeGrammar::new();
        // Reference is Wednesday; Friday is two days out, Tuesday six.
        assert_eq!(
            grammar.parse_date("on friday", reference()),
            NaiveDate::from_ymd_opt(2026, 8, 14)
        );
        assert_eq!(
            grammar.parse_date("tuesday", reference()),
            NaiveDate::from_ymd_opt(2026, 8, 18)
        );
        assert_eq!(next_occurrence(reference(), Weekday::Wed), reference() + chrono::Duration::days(7));
    }

    #[test]
    fn parses_clock_times() {
        let grammar = DateTimeGrammar::new();
        assert_eq!(grammar.parse_clock_time("at 6 pm"), NaiveTime::from_hms_opt(18, 0, 0));
        assert_eq!(grammar.parse_clock_time("6:30 PM"), NaiveTime::from_hms_opt(18, 30, 0));
        assert_eq!(grammar.parse_clock_time("12 am"), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(grammar.parse_clock_time("14:15"), NaiveTime::from_hms_opt(14, 15, 0));
        assert_eq!(grammar.parse_clock_time("around noon"), NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(grammar.parse_clock_time("no time here"), None);
    }

    #[test]
    fn full_parse_combines_date_and_time() {
        let grammar = DateTimeGrammar::new();
        let matched = grammar.parse("friday at 6 pm", reference());
        assert_eq!(matched.date, NaiveDate::from_ymd_opt(2026, 8, 14));
        assert_eq!(matched.time, NaiveTime::from_hms_opt(18, 0, 0));
    }
}
