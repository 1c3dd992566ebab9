//! External storage collaborator: the per-department knowledge base, the
//! attendant registry consulted at escalation time, the append-only chat
//! log mirror, and the on-demand backup export.
//!
//! Every failure here degrades to an empty result at the call site; nothing
//! from this crate propagates as an unhandled fault into the conversation
//! core.

pub mod entry;
pub mod export;
pub mod grounding;
pub mod logger;
pub mod store;

pub use entry::{AttendantConfig, ChatLogEntry, KnowledgeEntry};
pub use export::export_backup;
pub use grounding::{format_grounding, grounding_for};
pub use logger::ChatLogger;
pub use store::{FileSupportStore, SupportStore, DEFAULT_LOG_LIMIT};
