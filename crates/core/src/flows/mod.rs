pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, SchedulingFlow};
pub use states::{FlowAction, FlowEvent, TransitionOutcome};
