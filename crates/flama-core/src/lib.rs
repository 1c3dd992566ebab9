//! Core types shared by every Flama crate: departments, chat messages,
//! default quick-actions, and the error taxonomy.

pub mod actions;
pub mod department;
pub mod error;
pub mod message;

pub use actions::default_actions;
pub use department::Department;
pub use error::{FlamaError, FlamaResult};
pub use message::{Message, MessageMetadata, Role};
