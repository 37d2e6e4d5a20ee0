use async_trait::async_trait;

use slotwise_core::ConversationState;

use crate::parser::duration::DurationPatterns;

/// What one turn of user input means for the negotiation, given the state
/// the conversation is in. The dialogue engine and the deterministic
/// fallback both produce this type, so downstream code cannot tell which
/// one ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnSignal {
    ScheduleIntent,
    SmallTalk,
    Duration { minutes: i64 },
    TimePreference { text: String },
    Selection { index: usize },
    Affirmative,
    Negative,
    Unclear,
}

/// Turns raw user text into a [`TurnSignal`] for the current state.
/// `option_labels` carries the formatted text of the options presented in
/// the previous turn, for selection-by-day matching.
#[async_trait]
pub trait TurnInterpreter: Send + Sync {
    async fn interpret(
        &self,
        state: ConversationState,
        text: &str,
        option_labels: &[String],
    ) -> TurnSignal;
}

/// The deterministic interpretation path: lightweight pattern matching,
/// complete and self-sufficient without any dialogue engine.
pub struct FallbackInterpreter {
    durations: DurationPatterns,
}

impl Default for FallbackInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackInterpreter {
    pub fn new() -> Self {
        Self { durations: DurationPatterns::new() }
    }

    fn interpret_sync(
        &self,
        state: ConversationState,
        text: &str,
        option_labels: &[String],
    ) -> TurnSignal {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return TurnSignal::Unclear;
        }

        match state {
            ConversationState::Idle | ConversationState::Completed => {
                if detect_scheduling_intent(&normalized) {
                    TurnSignal::ScheduleIntent
                } else {
                    TurnSignal::SmallTalk
                }
            }
            ConversationState::WaitingForDuration => match self.durations.parse(&normalized) {
                Some(minutes) => TurnSignal::Duration { minutes },
                None => TurnSignal::Unclear,
            },
            ConversationState::WaitingForTime => TurnSignal::TimePreference { text: normalized },
            ConversationState::PresentingOptions | ConversationState::WaitingForSelection => {
                match parse_selection(&normalized, option_labels) {
                    Some(index) => TurnSignal::Selection { index },
                    None => TurnSignal::Unclear,
                }
            }
            ConversationState::ConfirmingDetails => match detect_affirmation(&normalized) {
                Some(true) => TurnSignal::Affirmative,
                Some(false) => TurnSignal::Negative,
                None => TurnSignal::Unclear,
            },
            ConversationState::CreatingEvent | ConversationState::Error => TurnSignal::Unclear,
        }
    }
}

#[async_trait]
impl TurnInterpreter for FallbackInterpreter {
    async fn interpret(
        &self,
        state: ConversationState,
        text: &str,
        option_labels: &[String],
    ) -> TurnSignal {
        self.interpret_sync(state, text, option_labels)
    }
}

const SCHEDULING_KEYWORDS: [&str; 8] = [
    "schedule",
    "meeting",
    "book",
    "calendar",
    "appointment",
    "find time",
    "find a time",
    "available",
];

pub fn detect_scheduling_intent(normalized_text: &str) -> bool {
    SCHEDULING_KEYWORDS.iter().any(|keyword| normalized_text.contains(keyword))
}

const AFFIRMATIVE_WORDS: [&str; 9] =
    ["yes", "yeah", "yep", "sure", "confirm", "correct", "ok", "okay", "go ahead"];
const NEGATIVE_WORDS: [&str; 7] = ["no", "nope", "nah", "cancel", "don't", "wrong", "different"];

pub fn detect_affirmation(normalized_text: &str) -> Option<bool> {
    let has_negative = NEGATIVE_WORDS
        .iter()
        .any(|word| contains_word(normalized_text, word) || normalized_text.contains("not "));
    if has_negative {
        return Some(false);
    }
    let has_affirmative =
        AFFIRMATIVE_WORDS.iter().any(|word| contains_word(normalized_text, word));
    has_affirmative.then_some(true)
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '\'')
        .any(|token| token == word)
        || (word.contains(' ') && text.contains(word))
}

const ORDINALS: [(&str, usize); 6] =
    [("first", 0), ("second", 1), ("third", 2), ("1st", 0), ("2nd", 1), ("3rd", 2)];

const WEEKDAY_NAMES: [&str; 7] =
    ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];

/// Resolve a selection against the previously presented options: a 1-based
/// number, an ordinal word, or a weekday name that appears in exactly one
/// option label.
pub fn parse_selection(normalized_text: &str, option_labels: &[String]) -> Option<usize> {
    if option_labels.is_empty() {
        return None;
    }

    for token in normalized_text.split(|c: char| !c.is_ascii_alphanumeric()) {
        if let Ok(number) = token.parse::<usize>() {
            if number >= 1 && number <= option_labels.len() {
                return Some(number - 1);
            }
        }
    }

    for (word, index) in ORDINALS {
        if normalized_text.contains(word) && index < option_labels.len() {
            return Some(index);
        }
    }

    for day in WEEKDAY_NAMES {
        if contains_word(normalized_text, day) {
            let matching: Vec<usize> = option_labels
                .iter()
                .enumerate()
                .filter(|(_, label)| label.to_lowercase().contains(day))
                .map(|(index, _)| index)
                .collect();
            if let [only] = matching[..] {
                return Some(only);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use slotwise_core::ConversationState;

    use super::{
        detect_affirmation, detect_scheduling_intent, parse_selection, FallbackInterpreter,
        TurnInterpreter, TurnSignal,
    };

    fn labels() -> Vec<String> {
        vec![
            "Tuesday, August 11 at 9:00 AM - 9:30 AM".to_string(),
            "Tuesday, August 11 at 11:15 AM - 11:45 AM".to_string(),
            "Wednesday, August 12 at 9:00 AM - 9:30 AM".to_string(),
        ]
    }

    #[test]
    fn scheduling_intent_keywords_are_detected() {
        assert!(detect_scheduling_intent("i need to schedule a meeting"));
        assert!(detect_scheduling_intent("can you book something for us"));
        assert!(detect_scheduling_intent("what's available tomorrow morning?"));
        assert!(!detect_scheduling_intent("how is the weather"));
    }

    #[test]
    fn selection_accepts_numbers_ordinals_and_days() {
        let labels = labels();

        assert_eq!(parse_selection("2", &labels), Some(1));
        assert_eq!(parse_selection("option 3 please", &labels), Some(2));
        assert_eq!(parse_selection("the second one", &labels), Some(1));
        assert_eq!(parse_selection("first", &labels), Some(0));
        // Wednesday appears in exactly one label.
        assert_eq!(parse_selection("wednesday works", &labels), Some(2));
        // Tuesday is ambiguous across two labels.
        assert_eq!(parse_selection("tuesday works", &labels), None);
        // Out of range numbers are not selections.
        assert_eq!(parse_selection("7", &labels), None);
        assert_eq!(parse_selection("none of those", &labels), None);
    }

    #[test]
    fn affirmation_detection_handles_negation() {
        assert_eq!(detect_affirmation("yes please"), Some(true));
        assert_eq!(detect_affirmation("sure, go ahead"), Some(true));
        assert_eq!(detect_affirmation("no, pick a different time"), Some(false));
        assert_eq!(detect_affirmation("that's not right"), Some(false));
        assert_eq!(detect_affirmation("hmm maybe"), None);
    }

    #[tokio::test]
    async fn interpreter_maps_text_by_state() {
        let interpreter = FallbackInterpreter::new();

        assert_eq!(
            interpreter.interpret(ConversationState::Idle, "I need a meeting", &[]).await,
            TurnSignal::ScheduleIntent
        );
        assert_eq!(
            interpreter.interpret(ConversationState::Idle, "hello there", &[]).await,
            TurnSignal::SmallTalk
        );
        assert_eq!(
            interpreter.interpret(ConversationState::WaitingForDuration, "45 minutes", &[]).await,
            TurnSignal::Duration { minutes: 45 }
        );
        assert_eq!(
            interpreter
                .interpret(ConversationState::WaitingForDuration, "dunno", &[])
                .await,
            TurnSignal::Unclear
        );
        assert_eq!(
            interpreter
                .interpret(ConversationState::WaitingForTime, "Next Tuesday afternoon", &[])
                .await,
            TurnSignal::TimePreference { text: "next tuesday afternoon".to_string() }
        );
        assert_eq!(
            interpreter
                .interpret(ConversationState::PresentingOptions, "2", &labels())
                .await,
            TurnSignal::Selection { index: 1 }
        );
        assert_eq!(
            interpreter.interpret(ConversationState::ConfirmingDetails, "yes", &[]).await,
            TurnSignal::Affirmative
        );
        assert_eq!(
            interpreter.interpret(ConversationState::ConfirmingDetails, "no thanks", &[]).await,
            TurnSignal::Negative
        );
    }
}
