//! DevPilot Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime
//! - Editor specifics
//!
//! All types here represent the conversation model of the DevPilot assistant.

pub mod conversation;
pub mod error;
pub mod functionality;
pub mod ids;
pub mod l10n;
pub mod message;
pub mod prompts;

// Re-export commonly used types
pub use conversation::Conversation;
pub use error::CoreError;
pub use functionality::Functionality;
pub use ids::MessageId;
pub use l10n::{Locale, TextKey};
pub use message::{
    CodeReference, Message, MessagePatch, MessageStatus, Position, Role, Selection,
    SymbolReference,
};
