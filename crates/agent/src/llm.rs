use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use slotwise_core::ConversationState;

use crate::conversation::{FallbackInterpreter, TurnInterpreter, TurnSignal};

/// The optional free-form dialogue collaborator. The runtime works fully
/// without one; when present it is only ever asked to translate text into
/// a turn signal, never to decide scheduling outcomes.
#[async_trait]
pub trait DialogueEngine: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Wire format the dialogue engine is asked to produce.
#[derive(Debug, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
enum WireSignal {
    ScheduleIntent,
    SmallTalk,
    Duration { minutes: i64 },
    TimePreference { text: String },
    Selection { index: usize },
    Affirmative,
    Negative,
    Unclear,
}

impl From<WireSignal> for TurnSignal {
    fn from(value: WireSignal) -> Self {
        match value {
            WireSignal::ScheduleIntent => Self::ScheduleIntent,
            WireSignal::SmallTalk => Self::SmallTalk,
            WireSignal::Duration { minutes } => Self::Duration { minutes },
            WireSignal::TimePreference { text } => Self::TimePreference { text },
            WireSignal::Selection { index } => Self::Selection { index },
            WireSignal::Affirmative => Self::Affirmative,
            WireSignal::Negative => Self::Negative,
            WireSignal::Unclear => Self::Unclear,
        }
    }
}

/// Interpreter that consults the dialogue engine first and falls back to
/// the deterministic path whenever the engine is unavailable, answers with
/// something unparseable, or returns a signal that contradicts the current
/// state. Either way the resulting signals, states, and prompts are the
/// same ones the fallback alone would produce.
pub struct DialogueInterpreter {
    engine: std::sync::Arc<dyn DialogueEngine>,
    fallback: FallbackInterpreter,
}

impl DialogueInterpreter {
    pub fn new(engine: std::sync::Arc<dyn DialogueEngine>) -> Self {
        Self { engine, fallback: FallbackInterpreter::new() }
    }

    fn extraction_prompt(
        state: ConversationState,
        text: &str,
        option_labels: &[String],
    ) -> String {
        let mut prompt = String::from(
            "Extract the scheduling signal from the user's message. Respond with a single JSON \
             object and nothing else. Allowed shapes:\n\
             {\"signal\":\"schedule_intent\"}\n\
             {\"signal\":\"small_talk\"}\n\
             {\"signal\":\"duration\",\"minutes\":30}\n\
             {\"signal\":\"time_preference\",\"text\":\"next tuesday afternoon\"}\n\
             {\"signal\":\"selection\",\"index\":0}\n\
             {\"signal\":\"affirmative\"}\n\
             {\"signal\":\"negative\"}\n\
             {\"signal\":\"unclear\"}\n",
        );
        prompt.push_str(&format!("Conversation state: {}\n", state.as_str()));
        if !option_labels.is_empty() {
            prompt.push_str("Presented options:\n");
            for (index, label) in option_labels.iter().enumerate() {
                prompt.push_str(&format!("{}. {label}\n", index + 1));
            }
        }
        prompt.push_str(&format!("User message: {text}\n"));
        prompt
    }

    fn plausible(state: ConversationState, signal: &TurnSignal, option_count: usize) -> bool {
        match signal {
            TurnSignal::Selection { index } => *index < option_count,
            TurnSignal::Duration { minutes } => *minutes > 0,
            TurnSignal::TimePreference { text } => !text.trim().is_empty(),
            _ => true,
        }
        .then(|| {
            // A signal must also make sense for the state it answers.
            matches!(
                (state, signal),
                (
                    ConversationState::Idle | ConversationState::Completed,
                    TurnSignal::ScheduleIntent | TurnSignal::SmallTalk | TurnSignal::Unclear
                )
                    | (ConversationState::WaitingForDuration, TurnSignal::Duration { .. })
                    | (ConversationState::WaitingForDuration, TurnSignal::Unclear)
                    | (ConversationState::WaitingForTime, TurnSignal::TimePreference { .. })
                    | (ConversationState::WaitingForTime, TurnSignal::Unclear)
                    | (
                        ConversationState::PresentingOptions
                            | ConversationState::WaitingForSelection,
                        TurnSignal::Selection { .. } | TurnSignal::Unclear
                    )
                    | (
                        ConversationState::ConfirmingDetails,
                        TurnSignal::Affirmative | TurnSignal::Negative | TurnSignal::Unclear
                    )
            )
        })
        .unwrap_or(false)
    }
}

#[async_trait]
impl TurnInterpreter for DialogueInterpreter {
    async fn interpret(
        &self,
        state: ConversationState,
        text: &str,
        option_labels: &[String],
    ) -> TurnSignal {
        let prompt = Self::extraction_prompt(state, text, option_labels);

        match self.engine.generate(&prompt).await {
            Ok(raw) => match serde_json::from_str::<WireSignal>(raw.trim()) {
                Ok(wire) => {
                    let signal = TurnSignal::from(wire);
                    if Self::plausible(state, &signal, option_labels.len()) {
                        return signal;
                    }
                    debug!(state = state.as_str(), "dialogue signal implausible, using fallback");
                    self.fallback.interpret(state, text, option_labels).await
                }
                Err(error) => {
                    debug!(%error, "dialogue engine returned non-JSON, using fallback");
                    self.fallback.interpret(state, text, option_labels).await
                }
            },
            Err(error) => {
                debug!(%error, "dialogue engine unavailable, using fallback");
                self.fallback.interpret(state, text, option_labels).await
            }
        }
    }
}
