//! Error types for chat orchestration.

use devpilot_core::{CoreError, MessageId};
use devpilot_llm::ProviderError;
use thiserror::Error;

/// Errors returned by command-level orchestrator APIs.
///
/// Provider failures during conversation turns never appear here; they
/// become conversation state. Only one-shot requests return them.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A code action was requested without selected code.
    #[error("No code selected")]
    NoSelection,

    /// A commit message was requested for an empty diff.
    #[error("No staged changes")]
    NoStagedChanges,

    /// The target message does not exist.
    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    /// Domain error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// One-shot provider request failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Malformed command from the webview.
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] serde_json::Error),
}

impl ChatError {
    pub(crate) fn invalid_role(operation: &str, role: impl std::fmt::Display) -> Self {
        ChatError::Core(CoreError::InvalidRole {
            operation: operation.to_string(),
            role: role.to_string(),
        })
    }
}
