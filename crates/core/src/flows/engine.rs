use crate::domain::session::ConversationState;
use crate::flows::states::{FlowAction, FlowEvent, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> ConversationState;
    fn transition(&self, current: ConversationState, event: &FlowEvent) -> TransitionOutcome;
}

/// The meeting-negotiation flow. The transition function is total: every
/// state/event pair maps to exactly one outcome, with unmatched pairs
/// self-looping behind a re-prompt so no input can leave the machine in an
/// undefined position.
#[derive(Clone, Debug, Default)]
pub struct SchedulingFlow;

impl FlowDefinition for SchedulingFlow {
    fn initial_state(&self) -> ConversationState {
        ConversationState::Idle
    }

    fn transition(&self, current: ConversationState, event: &FlowEvent) -> TransitionOutcome {
        transition_scheduling(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> ConversationState {
        self.flow.initial_state()
    }

    pub fn apply(&self, current: ConversationState, event: &FlowEvent) -> TransitionOutcome {
        self.flow.transition(current, event)
    }
}

impl Default for FlowEngine<SchedulingFlow> {
    fn default() -> Self {
        Self::new(SchedulingFlow)
    }
}

fn transition_scheduling(current: ConversationState, event: &FlowEvent) -> TransitionOutcome {
    use ConversationState::{
        Completed, ConfirmingDetails, CreatingEvent, Error, Idle, PresentingOptions,
        WaitingForDuration, WaitingForSelection, WaitingForTime,
    };
    use FlowAction::{
        AnnounceCompletion, ApologizeAndReset, AskClarification, AskDuration, AskTimePreference,
        ConfirmSelection, CreateEvent, Greet, OfferRetry, PresentOptions, RepromptDuration,
        RepromptSelection, RepromptState, ResumeTimeGathering,
    };

    let (to, actions) = match (current, event) {
        // Losing the session is recoverable from anywhere.
        (_, FlowEvent::SessionLost) => (Idle, vec![ApologizeAndReset]),
        (Error, _) => (Idle, vec![ApologizeAndReset]),

        (Idle, FlowEvent::ScheduleIntentDetected)
        | (Completed, FlowEvent::ScheduleIntentDetected) => {
            (WaitingForDuration, vec![AskDuration])
        }
        (Idle, _) => (Idle, vec![Greet]),

        (WaitingForDuration, FlowEvent::DurationProvided { .. }) => {
            (WaitingForTime, vec![AskTimePreference])
        }
        (WaitingForDuration, _) => (WaitingForDuration, vec![RepromptDuration]),

        (WaitingForTime, FlowEvent::SlotsFound { .. }) => (PresentingOptions, vec![PresentOptions]),
        (WaitingForTime, FlowEvent::NoSlotsFound) => (WaitingForTime, vec![OfferRetry]),
        (WaitingForTime, FlowEvent::ClarificationNeeded) => {
            (WaitingForTime, vec![AskClarification])
        }
        (WaitingForTime, _) => (WaitingForTime, vec![RepromptState]),

        // PresentingOptions and WaitingForSelection both await a pick; the
        // latter exists for resumed sessions persisted mid-presentation.
        (PresentingOptions, FlowEvent::OptionSelected { .. })
        | (WaitingForSelection, FlowEvent::OptionSelected { .. }) => {
            (ConfirmingDetails, vec![ConfirmSelection])
        }
        (PresentingOptions, _) => (PresentingOptions, vec![RepromptSelection]),
        (WaitingForSelection, _) => (WaitingForSelection, vec![RepromptSelection]),

        (ConfirmingDetails, FlowEvent::Confirmed) => (CreatingEvent, vec![CreateEvent]),
        (ConfirmingDetails, FlowEvent::Declined) => (WaitingForTime, vec![ResumeTimeGathering]),
        (ConfirmingDetails, _) => (ConfirmingDetails, vec![RepromptState]),

        (CreatingEvent, FlowEvent::EventCreated) => (Completed, vec![AnnounceCompletion]),
        (CreatingEvent, FlowEvent::EventCreationFailed) => (WaitingForTime, vec![OfferRetry]),
        (CreatingEvent, _) => (CreatingEvent, vec![RepromptState]),

        (Completed, _) => (Completed, vec![RepromptState]),
    };

    TransitionOutcome { from: current, to, event: event.clone(), actions }
}

#[cfg(test)]
mod tests {
    use crate::domain::session::ConversationState;
    use crate::flows::engine::{FlowDefinition, FlowEngine, SchedulingFlow};
    use crate::flows::states::{FlowAction, FlowEvent};

    #[test]
    fn happy_path_reaches_completed() {
        let engine = FlowEngine::default();
        let mut state = engine.initial_state();
        assert_eq!(state, ConversationState::Idle);

        let script = [
            (FlowEvent::ScheduleIntentDetected, ConversationState::WaitingForDuration),
            (FlowEvent::DurationProvided { minutes: 30 }, ConversationState::WaitingForTime),
            (FlowEvent::SlotsFound { count: 3 }, ConversationState::PresentingOptions),
            (FlowEvent::OptionSelected { index: 1 }, ConversationState::ConfirmingDetails),
            (FlowEvent::Confirmed, ConversationState::CreatingEvent),
            (FlowEvent::EventCreated, ConversationState::Completed),
        ];

        for (event, expected) in script {
            let outcome = engine.apply(state, &event);
            assert_eq!(outcome.to, expected, "after {event:?}");
            state = outcome.to;
        }
    }

    #[test]
    fn selection_after_three_options_confirms_the_pick() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(ConversationState::PresentingOptions, &FlowEvent::OptionSelected { index: 1 });

        assert_eq!(outcome.to, ConversationState::ConfirmingDetails);
        assert_eq!(outcome.actions, vec![FlowAction::ConfirmSelection]);
        assert_eq!(outcome.event, FlowEvent::OptionSelected { index: 1 });
    }

    #[test]
    fn unclear_inputs_self_loop_with_reprompts() {
        let engine = FlowEngine::default();

        let duration = engine
            .apply(ConversationState::WaitingForDuration, &FlowEvent::DurationUnclear);
        assert_eq!(duration.to, ConversationState::WaitingForDuration);
        assert_eq!(duration.actions, vec![FlowAction::RepromptDuration]);

        let selection =
            engine.apply(ConversationState::PresentingOptions, &FlowEvent::SelectionUnclear);
        assert_eq!(selection.to, ConversationState::PresentingOptions);
        assert_eq!(selection.actions, vec![FlowAction::RepromptSelection]);

        let no_slots = engine.apply(ConversationState::WaitingForTime, &FlowEvent::NoSlotsFound);
        assert_eq!(no_slots.to, ConversationState::WaitingForTime);
        assert_eq!(no_slots.actions, vec![FlowAction::OfferRetry]);
    }

    #[test]
    fn declining_confirmation_returns_to_time_gathering() {
        let engine = FlowEngine::default();
        let outcome = engine.apply(ConversationState::ConfirmingDetails, &FlowEvent::Declined);

        assert_eq!(outcome.to, ConversationState::WaitingForTime);
        assert_eq!(outcome.actions, vec![FlowAction::ResumeTimeGathering]);
    }

    #[test]
    fn failed_event_creation_offers_retry() {
        let engine = FlowEngine::default();
        let outcome =
            engine.apply(ConversationState::CreatingEvent, &FlowEvent::EventCreationFailed);

        assert_eq!(outcome.to, ConversationState::WaitingForTime);
        assert_eq!(outcome.actions, vec![FlowAction::OfferRetry]);
    }

    #[test]
    fn session_loss_resets_from_every_state() {
        let engine = FlowEngine::default();
        for state in ConversationState::ALL {
            let outcome = engine.apply(state, &FlowEvent::SessionLost);
            assert_eq!(outcome.to, ConversationState::Idle);
            assert_eq!(outcome.actions, vec![FlowAction::ApologizeAndReset]);
        }
    }

    #[test]
    fn completed_sessions_accept_a_new_request() {
        let engine = FlowEngine::default();
        let outcome =
            engine.apply(ConversationState::Completed, &FlowEvent::ScheduleIntentDetected);
        assert_eq!(outcome.to, ConversationState::WaitingForDuration);
    }

    #[test]
    fn transition_table_is_total_and_deterministic() {
        let engine = FlowEngine::default();

        for state in ConversationState::ALL {
            for event in FlowEvent::representatives() {
                let first = engine.apply(state, &event);
                let second = engine.apply(state, &event);
                assert_eq!(first, second, "transition must be deterministic");
                assert_eq!(first.from, state);
                assert!(
                    !first.actions.is_empty(),
                    "every transition carries at least one action ({state:?}, {event:?})"
                );
            }
        }
    }
}
