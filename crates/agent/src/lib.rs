//! Conversation runtime - temporal parsing and negotiation orchestration
//!
//! This crate is the "brain" of the slotwise system:
//! - Parses natural-language time expressions into structured, scored
//!   intents (`parser`)
//! - Extracts per-turn signals deterministically, with or without a
//!   dialogue engine (`conversation`, `llm`)
//! - Drives the negotiation state machine turn by turn and talks to the
//!   calendar and session store (`runtime`)
//!
//! # Architecture
//!
//! Each turn follows a constrained loop:
//! 1. **Signal extraction** (`conversation`) - user text → `TurnSignal`
//! 2. **Time resolution** (`parser`) - preference text → `TimeIntent`
//! 3. **Slot search** - busy intervals → candidates → constraint filter
//! 4. **Flow transition** - `TurnSignal` → `FlowEvent` → next state + prompt
//!
//! # Safety Principle
//!
//! The dialogue engine is strictly a translator. It never picks slots,
//! never invents availability, and never advances the state machine on its
//! own. Those are deterministic decisions made by the core flow, and the
//! runtime behaves identically when the engine is absent.

pub mod conversation;
pub mod llm;
pub mod parser;
pub mod runtime;
