//! Response Service: wraps a language-model text call with department
//! grounding and returns a structured reply plus suggested quick-actions.
//!
//! Every failure path inside this crate resolves to a usable [`BotReply`];
//! the orchestrator never sees a model error.

pub mod gemini;
pub mod model;
pub mod responder;

pub use gemini::GeminiBackend;
pub use model::{HistoryTurn, LanguageModel, ModelConfig, Speaker};
pub use responder::{BotReply, Responder, ResponseService};
