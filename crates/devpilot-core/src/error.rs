//! Core domain errors.

use thiserror::Error;

/// Core domain errors for DevPilot.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Message not found in the conversation.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Unknown message role.
    #[error("Unknown message role: {0}")]
    UnknownRole(String),

    /// Unknown functionality tag.
    #[error("Unknown functionality: {0}")]
    UnknownFunctionality(String),

    /// Unknown provider name.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Unknown locale.
    #[error("Unknown locale: {0}")]
    UnknownLocale(String),

    /// Operation not valid for a message of this role.
    #[error("Operation '{operation}' not valid for {role} message")]
    InvalidRole { operation: String, role: String },
}
