//! The conversation core: a state machine over one session
//! (idle → bot → waiting_human → human) that routes user messages to the
//! grounded responder, detects escalation intent, and hands the
//! conversation to a human attendant through a WhatsApp deep link.

pub mod escalation;
pub mod orchestrator;

pub use escalation::{
    handoff_link, normalize_phone, resolve_attendant, wants_human, HandoffOpener,
    FALLBACK_ATTENDANT,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
