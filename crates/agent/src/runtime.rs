use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use slotwise_core::config::{AppConfig, ConfigError};
use slotwise_core::domain::meeting::MeetingRequestPatch;
use slotwise_core::domain::session::SessionStats;
use slotwise_core::{
    find_slots, CalendarBackend, ConstraintSet, ConversationSession, ConversationState,
    FlowAction, FlowEngine, FlowEvent, SchedulingFlow, SessionStore, SlotSearch, TimeSlot,
    WorkHours,
};

use crate::conversation::{FallbackInterpreter, TurnInterpreter, TurnSignal};
use crate::llm::{DialogueEngine, DialogueInterpreter};
use crate::parser::{TemporalParser, TimeIntent};

const WELCOME: &str = "Hello! I'm your meeting scheduler. I can help you find and schedule \
                       meetings. What would you like to do today?";
const GREETING: &str = "Hello! I can help you schedule meetings. Just say something like 'I need \
                        to schedule a meeting' to get started.";
const ASK_DURATION: &str =
    "I'd be happy to help you schedule a meeting! How long should the meeting be?";
const REPROMPT_DURATION: &str = "I couldn't understand the duration. Please tell me how long the \
                                 meeting should be, like '30 minutes' or '1 hour'.";
const NO_SLOTS: &str = "I couldn't find any available slots for that time. Would you like to try \
                        a different time or duration?";
const CALENDAR_DOWN: &str = "I can't access your calendar right now, so I couldn't look for \
                             available times. Let's try again in a moment.";
const REPROMPT_SELECTION: &str = "Please pick one of the options by number, like 'option 1'.";
const COMPLETED: &str = "Great! Your meeting has been scheduled. Have a wonderful day!";
const DECLINED: &str = "No problem. When would you prefer to schedule the meeting?";
const APOLOGY_RESET: &str = "I'm sorry, I lost track of our conversation. Let's start over.";
const CREATE_FAILED: &str =
    "I couldn't create the calendar event. Would you like to try a different time?";
const SAVE_FAILED: &str = "I'm having trouble saving our conversation right now. Could you say \
                           that again in a moment?";
const EMPTY_INPUT: &str = "I didn't catch that. Could you please repeat?";

/// Scheduling knobs the runtime needs, distilled from [`AppConfig`].
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub tz: Tz,
    pub work_hours: WorkHours,
    pub buffer_minutes: i64,
    pub search_window_days: i64,
    pub max_presented_options: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tz: Tz::UTC,
            work_hours: WorkHours::default(),
            buffer_minutes: 15,
            search_window_days: 7,
            max_presented_options: 3,
        }
    }
}

impl RuntimeConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tz: config.scheduling.tz()?,
            work_hours: WorkHours {
                start_hour: config.scheduling.work_hours_start,
                end_hour: config.scheduling.work_hours_end,
            },
            buffer_minutes: config.scheduling.buffer_minutes,
            search_window_days: config.scheduling.search_window_days,
            max_presented_options: config.scheduling.max_presented_options,
        })
    }
}

/// A candidate slot as handed to the presentation layer: bounds, duration,
/// and a spoken-style label. Nothing else crosses that boundary.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SlotOption {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_minutes: i64,
    pub label: String,
}

impl SlotOption {
    fn from_slot(slot: &TimeSlot, tz: Tz) -> Self {
        Self {
            start: slot.start,
            end: slot.end,
            duration_minutes: slot.duration_minutes,
            label: slot.label(tz),
        }
    }
}

/// What one turn produced: plain text for the user plus the structured
/// options when some were presented.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnResponse {
    pub session_id: String,
    pub reply: String,
    pub state: ConversationState,
    pub needs_clarification: bool,
    pub options: Vec<SlotOption>,
}

/// Per-session turn serialization. Turns on the same session queue behind
/// an async mutex; unrelated sessions proceed unimpeded.
#[derive(Default)]
struct SessionLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    fn acquire(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(session_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// The negotiation driver. One instance serves many sessions; each turn is
/// atomic: the session is mutated on a working copy and persisted once at
/// the end, so a failed turn leaves the stored state untouched.
pub struct SchedulerRuntime {
    config: RuntimeConfig,
    parser: TemporalParser,
    flow: FlowEngine<SchedulingFlow>,
    calendar: Arc<dyn CalendarBackend>,
    store: Arc<dyn SessionStore>,
    interpreter: Arc<dyn TurnInterpreter>,
    locks: SessionLocks,
}

impl SchedulerRuntime {
    /// Runtime with the deterministic interpretation path only.
    pub fn new(
        config: RuntimeConfig,
        calendar: Arc<dyn CalendarBackend>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            parser: TemporalParser::new(calendar.clone()),
            flow: FlowEngine::default(),
            calendar,
            store,
            interpreter: Arc::new(FallbackInterpreter::new()),
            locks: SessionLocks::default(),
            config,
        }
    }

    /// Runtime that consults a dialogue engine for signal extraction. The
    /// engine only translates; states and prompts are identical to the
    /// deterministic path.
    pub fn with_dialogue(
        config: RuntimeConfig,
        calendar: Arc<dyn CalendarBackend>,
        store: Arc<dyn SessionStore>,
        engine: Arc<dyn DialogueEngine>,
    ) -> Self {
        let mut runtime = Self::new(config, calendar, store);
        runtime.interpreter = Arc::new(DialogueInterpreter::new(engine));
        runtime
    }

    pub async fn start_session(
        &self,
        session_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TurnResponse, slotwise_core::SessionStoreError> {
        let session = ConversationSession::new(session_id, user_id, now);
        self.store.save(&session).await?;

        info!(
            event_name = "agent.session.started",
            session_id = session_id,
            user_id = user_id,
            "conversation session created"
        );

        Ok(TurnResponse {
            session_id: session_id.to_string(),
            reply: WELCOME.to_string(),
            state: ConversationState::Idle,
            needs_clarification: false,
            options: Vec::new(),
        })
    }

    pub async fn session_stats(&self, session_id: &str) -> Option<SessionStats> {
        self.store.load(session_id).await.ok().flatten().map(|session| session.stats())
    }

    pub async fn delete_session(
        &self,
        session_id: &str,
    ) -> Result<(), slotwise_core::SessionStoreError> {
        self.store.delete(session_id).await
    }

    /// Process one user turn. Never fails outward: every outcome, including
    /// lost sessions and collaborator failures, becomes a well-formed
    /// response.
    pub async fn handle_turn(
        &self,
        session_id: &str,
        user_text: &str,
        now: DateTime<Utc>,
    ) -> TurnResponse {
        let lock = self.locks.acquire(session_id);
        let _turn_guard = lock.lock().await;

        let mut session = match self.store.load(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) | Err(_) => return self.reset_lost_session(session_id, user_text, now).await,
        };

        let prior_state = session.state();

        if user_text.trim().is_empty() {
            session.record_turn(user_text, EMPTY_INPUT, now);
            return self.commit(session, prior_state, EMPTY_INPUT.to_string(), false, Vec::new()).await;
        }

        let labels = self.presented_labels(&session);
        let signal = self.interpreter.interpret(prior_state, user_text, &labels).await;

        let (reply, needs_clarification, options) = match signal {
            TurnSignal::ScheduleIntent => {
                self.on_schedule_intent(&mut session, user_text, now).await
            }
            TurnSignal::Duration { minutes } => self.on_duration(&mut session, minutes, now),
            TurnSignal::TimePreference { text } => {
                self.on_time_preference(&mut session, &text, now).await
            }
            TurnSignal::Selection { index } => self.on_selection(&mut session, index, now),
            TurnSignal::Affirmative => self.on_confirmed(&mut session, now).await,
            TurnSignal::Negative => self.on_declined(&mut session, now),
            TurnSignal::SmallTalk | TurnSignal::Unclear => self.on_undirected(&mut session, now),
        };

        info!(
            event_name = "agent.turn.completed",
            session_id = session_id,
            from_state = prior_state.as_str(),
            to_state = session.state().as_str(),
            "turn processed"
        );

        session.record_turn(user_text, reply.as_str(), now);
        self.commit(session, prior_state, reply, needs_clarification, options).await
    }

    /// Find slots without a conversation: used by the one-shot CLI/HTTP
    /// query paths.
    pub async fn one_shot_slots(
        &self,
        duration_minutes: i64,
        preference: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<SlotOption> {
        let intent = match preference {
            Some(text) => self.parser.parse(text, now, self.config.tz).await,
            None => TimeIntent::no_match(),
        };
        let constraints = intent.constraints.clone();
        let search = self.search_slots(duration_minutes, &constraints, &intent, now).await;
        search
            .slots
            .iter()
            .map(|slot| SlotOption::from_slot(slot, self.config.tz))
            .collect()
    }

    async fn commit(
        &self,
        session: ConversationSession,
        prior_state: ConversationState,
        reply: String,
        needs_clarification: bool,
        options: Vec<SlotOption>,
    ) -> TurnResponse {
        match self.store.save(&session).await {
            Ok(()) => TurnResponse {
                session_id: session.session_id().to_string(),
                reply,
                state: session.state(),
                needs_clarification,
                options,
            },
            Err(error) => {
                warn!(
                    event_name = "agent.turn.save_failed",
                    session_id = session.session_id(),
                    error = %error,
                    "session save failed, turn discarded"
                );
                TurnResponse {
                    session_id: session.session_id().to_string(),
                    reply: SAVE_FAILED.to_string(),
                    state: prior_state,
                    needs_clarification: false,
                    options: Vec::new(),
                }
            }
        }
    }

    async fn reset_lost_session(
        &self,
        session_id: &str,
        user_text: &str,
        now: DateTime<Utc>,
    ) -> TurnResponse {
        let outcome = self.flow.apply(ConversationState::Idle, &FlowEvent::SessionLost);
        let mut session = ConversationSession::new(session_id, "unknown", now);
        session.set_state(outcome.to, now);
        session.record_turn(user_text, APOLOGY_RESET, now);
        if let Err(error) = self.store.save(&session).await {
            warn!(
                event_name = "agent.session.reset_save_failed",
                session_id = session_id,
                error = %error,
                "could not persist reset session"
            );
        }

        TurnResponse {
            session_id: session_id.to_string(),
            reply: APOLOGY_RESET.to_string(),
            state: ConversationState::Idle,
            needs_clarification: false,
            options: Vec::new(),
        }
    }

    fn presented_labels(&self, session: &ConversationSession) -> Vec<String> {
        session
            .meeting_request()
            .available_slots
            .iter()
            .take(self.config.max_presented_options)
            .map(|slot| slot.label(self.config.tz))
            .collect()
    }

    fn advance(&self, session: &mut ConversationSession, event: FlowEvent, now: DateTime<Utc>) -> Vec<FlowAction> {
        let outcome = self.flow.apply(session.state(), &event);
        session.set_state(outcome.to, now);
        outcome.actions
    }

    async fn on_schedule_intent(
        &self,
        session: &mut ConversationSession,
        user_text: &str,
        now: DateTime<Utc>,
    ) -> (String, bool, Vec<SlotOption>) {
        session.reset_request(now);
        self.advance(session, FlowEvent::ScheduleIntentDetected, now);

        // One utterance often carries the whole request; pull what it has
        // and skip the questions already answered.
        let complex = self.parser.parse_complex_request(user_text, now, self.config.tz).await;

        let Some(minutes) = complex.duration_minutes else {
            return (ASK_DURATION.to_string(), false, Vec::new());
        };

        session.update_request(
            MeetingRequestPatch { duration_minutes: Some(minutes), ..MeetingRequestPatch::default() },
            now,
        );
        self.advance(session, FlowEvent::DurationProvided { minutes }, now);

        match complex.time {
            Some(intent) => self.resolve_and_present(session, user_text, intent, now).await,
            None => (ask_time_reply(minutes), false, Vec::new()),
        }
    }

    fn on_duration(
        &self,
        session: &mut ConversationSession,
        minutes: i64,
        now: DateTime<Utc>,
    ) -> (String, bool, Vec<SlotOption>) {
        if minutes <= 0 {
            self.advance(session, FlowEvent::DurationUnclear, now);
            return (REPROMPT_DURATION.to_string(), false, Vec::new());
        }

        session.update_request(
            MeetingRequestPatch { duration_minutes: Some(minutes), ..MeetingRequestPatch::default() },
            now,
        );
        self.advance(session, FlowEvent::DurationProvided { minutes }, now);
        (ask_time_reply(minutes), false, Vec::new())
    }

    async fn on_time_preference(
        &self,
        session: &mut ConversationSession,
        preference: &str,
        now: DateTime<Utc>,
    ) -> (String, bool, Vec<SlotOption>) {
        let intent = self.parser.parse(preference, now, self.config.tz).await;
        self.resolve_and_present(session, preference, intent, now).await
    }

    /// Shared tail of the time-gathering path: resolve the intent into
    /// candidate slots and either present options or explain why not.
    async fn resolve_and_present(
        &self,
        session: &mut ConversationSession,
        preference: &str,
        intent: TimeIntent,
        now: DateTime<Utc>,
    ) -> (String, bool, Vec<SlotOption>) {
        if intent.needs_clarification {
            self.advance(session, FlowEvent::ClarificationNeeded, now);
            return (intent.clarification.clone(), true, Vec::new());
        }

        let mut constraints = session.meeting_request().constraints.clone();
        constraints.merge(intent.constraints.clone());

        let duration_minutes = session
            .meeting_request()
            .duration_minutes
            .or(intent.duration_minutes)
            .unwrap_or(60);

        session.update_request(
            MeetingRequestPatch {
                duration_minutes: Some(duration_minutes),
                preferred_time: Some(preference.to_string()),
                constraints: Some(constraints.clone()),
                ..MeetingRequestPatch::default()
            },
            now,
        );

        let search = self.search_slots(duration_minutes, &constraints, &intent, now).await;
        if search.calendar_down {
            self.advance(session, FlowEvent::NoSlotsFound, now);
            return (CALENDAR_DOWN.to_string(), false, Vec::new());
        }
        if search.slots.is_empty() {
            self.advance(session, FlowEvent::NoSlotsFound, now);
            return (NO_SLOTS.to_string(), false, Vec::new());
        }

        session.update_request(
            MeetingRequestPatch {
                available_slots: Some(search.slots.clone()),
                ..MeetingRequestPatch::default()
            },
            now,
        );
        self.advance(session, FlowEvent::SlotsFound { count: search.slots.len() }, now);

        let options: Vec<SlotOption> = search
            .slots
            .iter()
            .take(self.config.max_presented_options)
            .map(|slot| SlotOption::from_slot(slot, self.config.tz))
            .collect();
        (present_options_reply(&options), false, options)
    }

    fn on_selection(
        &self,
        session: &mut ConversationSession,
        index: usize,
        now: DateTime<Utc>,
    ) -> (String, bool, Vec<SlotOption>) {
        let presented: Vec<TimeSlot> = session
            .meeting_request()
            .available_slots
            .iter()
            .take(self.config.max_presented_options)
            .copied()
            .collect();

        let Some(slot) = presented.get(index).copied() else {
            self.advance(session, FlowEvent::SelectionUnclear, now);
            return (REPROMPT_SELECTION.to_string(), false, Vec::new());
        };

        session.update_request(
            MeetingRequestPatch { selected_slot: Some(slot), ..MeetingRequestPatch::default() },
            now,
        );
        self.advance(session, FlowEvent::OptionSelected { index }, now);

        let minutes = session.meeting_request().duration_minutes.unwrap_or(slot.duration_minutes);
        (confirm_reply(minutes, &slot.label(self.config.tz)), false, Vec::new())
    }

    async fn on_confirmed(
        &self,
        session: &mut ConversationSession,
        now: DateTime<Utc>,
    ) -> (String, bool, Vec<SlotOption>) {
        self.advance(session, FlowEvent::Confirmed, now);

        let Some(slot) = session.meeting_request().selected_slot else {
            self.advance(session, FlowEvent::EventCreationFailed, now);
            return (CREATE_FAILED.to_string(), false, Vec::new());
        };

        let title = session
            .meeting_request()
            .title
            .clone()
            .unwrap_or_else(|| "Meeting".to_string());
        let description = session.meeting_request().description.clone().unwrap_or_default();
        let attendees = session.meeting_request().attendees.clone();

        let created = self
            .calendar
            .create_event(&title, slot.start, slot.end, &description, &attendees)
            .await;

        match created {
            Ok(Some(event_id)) => {
                info!(
                    event_name = "agent.event.created",
                    session_id = session.session_id(),
                    calendar_event_id = %event_id,
                    "calendar event created"
                );
                self.advance(session, FlowEvent::EventCreated, now);
                (COMPLETED.to_string(), false, Vec::new())
            }
            Ok(None) | Err(_) => {
                warn!(
                    event_name = "agent.event.create_failed",
                    session_id = session.session_id(),
                    "calendar event creation failed"
                );
                self.advance(session, FlowEvent::EventCreationFailed, now);
                (CREATE_FAILED.to_string(), false, Vec::new())
            }
        }
    }

    fn on_declined(
        &self,
        session: &mut ConversationSession,
        now: DateTime<Utc>,
    ) -> (String, bool, Vec<SlotOption>) {
        session.update_request(
            MeetingRequestPatch {
                available_slots: Some(Vec::new()),
                ..MeetingRequestPatch::default()
            },
            now,
        );
        self.advance(session, FlowEvent::Declined, now);
        (DECLINED.to_string(), false, Vec::new())
    }

    fn on_undirected(
        &self,
        session: &mut ConversationSession,
        now: DateTime<Utc>,
    ) -> (String, bool, Vec<SlotOption>) {
        let event = match session.state() {
            ConversationState::WaitingForDuration => FlowEvent::DurationUnclear,
            ConversationState::PresentingOptions | ConversationState::WaitingForSelection => {
                FlowEvent::SelectionUnclear
            }
            _ => FlowEvent::SmallTalk,
        };
        let actions = self.advance(session, event, now);

        let reply = match actions.first() {
            Some(FlowAction::RepromptDuration) => REPROMPT_DURATION,
            Some(FlowAction::RepromptSelection) => REPROMPT_SELECTION,
            Some(FlowAction::Greet) => GREETING,
            _ => GREETING,
        };
        (reply.to_string(), false, Vec::new())
    }

    async fn search_slots(
        &self,
        duration_minutes: i64,
        constraints: &ConstraintSet,
        intent: &TimeIntent,
        now: DateTime<Utc>,
    ) -> SearchOutcome {
        let (window_start, window_end) = intent.window().unwrap_or_else(|| {
            let start = now + Duration::hours(1);
            (start, start + Duration::days(self.config.search_window_days))
        });

        let busy = match self.calendar.get_busy_intervals(window_start, window_end).await {
            Ok(busy) => busy,
            Err(error) => {
                warn!(
                    event_name = "agent.calendar.busy_query_failed",
                    error = %error,
                    "busy interval query failed, reporting no availability"
                );
                return SearchOutcome { slots: Vec::new(), calendar_down: true };
            }
        };

        let search = SlotSearch {
            duration_minutes,
            buffer_minutes: self.config.buffer_minutes,
            window_start,
            window_end,
            work_hours: self.config.work_hours,
            include_weekends: constraints.weekends_only(),
            tz: self.config.tz,
        };

        let candidates = find_slots(&search, &busy);
        let slots = constraints.apply(&candidates, self.config.tz);
        SearchOutcome { slots, calendar_down: false }
    }
}

struct SearchOutcome {
    slots: Vec<TimeSlot>,
    calendar_down: bool,
}

fn ask_time_reply(minutes: i64) -> String {
    format!("Got it, {minutes} minutes. When would you like to schedule this meeting?")
}

fn confirm_reply(minutes: i64, label: &str) -> String {
    format!(
        "Perfect! I'll schedule a {minutes}-minute meeting for {label}. Should I go ahead and \
         create this meeting?"
    )
}

fn present_options_reply(options: &[SlotOption]) -> String {
    let mut reply = String::from("Great! I found these available times for your meeting:\n\n");
    for (index, option) in options.iter().enumerate() {
        reply.push_str(&format!("{}. {}\n", index + 1, option.label));
    }
    reply.push_str("\nWhich one works for you?");
    reply
}
