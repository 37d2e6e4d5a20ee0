use regex::Regex;

/// Parser for meeting-length phrases: "30 minutes", "1.5 hours", "1h",
/// "half an hour", "a quarter day".
pub struct DurationPatterns {
    fraction: Regex,
    word: Regex,
    numeric: Regex,
}

impl Default for DurationPatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl DurationPatterns {
    pub fn new() -> Self {
        Self {
            fraction: Regex::new(r"(?i)\b(half|quarter)\s+(?:an?\s+)?(hour|day)\b")
                .expect("static regex"),
            word: Regex::new(r"(?i)\b(?:an?|one)\s+hour\b").expect("static regex"),
            numeric: Regex::new(
                r"(?i)\b(\d+(?:\.\d+)?)[\s-]*(minutes?|mins?|min|hours?|hrs?|hr|h|m)\b",
            )
            .expect("static regex"),
        }
    }

    /// Extract a duration in minutes, or `None` when the text carries no
    /// recognizable duration phrase.
    pub fn parse(&self, text: &str) -> Option<i64> {
        if let Some(caps) = self.fraction.captures(text) {
            let fraction = caps[1].to_ascii_lowercase();
            let unit = caps[2].to_ascii_lowercase();
            return Some(match (fraction.as_str(), unit.as_str()) {
                ("half", "hour") => 30,
                ("quarter", "hour") => 15,
                ("half", "day") => 480,
                _ => 120,
            });
        }

        if let Some(caps) = self.numeric.captures(text) {
            let amount: f64 = caps[1].parse().ok()?;
            let unit = caps[2].to_ascii_lowercase();
            let minutes = if unit.starts_with('h') { amount * 60.0 } else { amount };
            let minutes = minutes.round() as i64;
            return (minutes > 0).then_some(minutes);
        }

        if self.word.is_match(text) {
            return Some(60);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::DurationPatterns;

    #[test]
    fn parses_common_duration_phrases() {
        let patterns = DurationPatterns::new();
        let cases = [
            ("30 minutes", Some(30)),
            ("45 mins", Some(45)),
            ("90 min", Some(90)),
            ("1 hour", Some(60)),
            ("2 hours", Some(120)),
            ("1.5 hours", Some(90)),
            ("1h", Some(60)),
            ("20m", Some(20)),
            ("half an hour", Some(30)),
            ("a quarter hour", Some(15)),
            ("half a day", Some(480)),
            ("quarter day", Some(120)),
            ("an hour", Some(60)),
            ("one hour", Some(60)),
            ("sometime tomorrow", None),
            ("0 minutes", None),
        ];

        for (text, expected) in cases {
            assert_eq!(patterns.parse(text), expected, "for `{text}`");
        }
    }

    #[test]
    fn duration_is_found_inside_larger_requests() {
        let patterns = DurationPatterns::new();
        assert_eq!(
            patterns.parse("I need to schedule a 30-minute meeting for next Tuesday"),
            Some(30)
        );
        assert_eq!(patterns.parse("find me an hour slot sometime next week"), Some(60));
    }
}
