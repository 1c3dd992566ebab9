//! Conversation session state and its local persistence.
//!
//! A [`Session`] is the single shared mutable record of the widget: the
//! orchestrator owns it exclusively and writes it through a
//! [`SessionStore`] after every committed mutation.

pub mod session;
pub mod store;

pub use session::{Session, SessionStatus, ThemeConfig};
pub use store::{FileSessionStore, SessionStore};
