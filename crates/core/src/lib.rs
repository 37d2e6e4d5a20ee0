pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod scheduling;

pub use domain::calendar::{
    BusyInterval, CalendarBackend, CalendarError, CalendarEvent, StaticCalendarBackend, TimeSlot,
};
pub use domain::meeting::{MeetingRequest, MeetingRequestPatch};
pub use domain::session::{
    ConversationSession, ConversationState, ConversationTurn, SessionStats, SessionStore,
    SessionStoreError,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::engine::{FlowDefinition, FlowEngine, SchedulingFlow};
pub use flows::states::{FlowAction, FlowEvent, TransitionOutcome};
pub use scheduling::availability::{find_slots, SlotSearch, WorkHours, MAX_SLOTS};
pub use scheduling::constraints::{ConstraintSet, SlotConstraint};
