use serde::{Deserialize, Serialize};

use crate::domain::session::ConversationState;

/// What the current turn told us, as extracted by either the dialogue
/// engine or the deterministic fallback. Both producers emit the same
/// events, so the flow cannot tell them apart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    ScheduleIntentDetected,
    SmallTalk,
    DurationProvided { minutes: i64 },
    DurationUnclear,
    SlotsFound { count: usize },
    NoSlotsFound,
    ClarificationNeeded,
    OptionSelected { index: usize },
    SelectionUnclear,
    Confirmed,
    Declined,
    EventCreated,
    EventCreationFailed,
    SessionLost,
}

impl FlowEvent {
    /// One representative of every event shape, used to enumerate the
    /// transition table in tests.
    pub fn representatives() -> Vec<FlowEvent> {
        vec![
            Self::ScheduleIntentDetected,
            Self::SmallTalk,
            Self::DurationProvided { minutes: 30 },
            Self::DurationUnclear,
            Self::SlotsFound { count: 3 },
            Self::NoSlotsFound,
            Self::ClarificationNeeded,
            Self::OptionSelected { index: 0 },
            Self::SelectionUnclear,
            Self::Confirmed,
            Self::Declined,
            Self::EventCreated,
            Self::EventCreationFailed,
            Self::SessionLost,
        ]
    }
}

/// Side effects the runtime performs after a transition, chiefly which
/// prompt to speak next.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    Greet,
    AskDuration,
    RepromptDuration,
    AskTimePreference,
    PresentOptions,
    OfferRetry,
    AskClarification,
    ConfirmSelection,
    RepromptSelection,
    CreateEvent,
    AnnounceCompletion,
    ResumeTimeGathering,
    ApologizeAndReset,
    RepromptState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: ConversationState,
    pub to: ConversationState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
