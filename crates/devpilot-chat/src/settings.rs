//! User-facing chat settings.

use devpilot_core::Locale;

/// Settings the orchestrator reads on every turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    /// Locale for answers and for text written into the conversation.
    pub locale: Locale,

    /// Display name of the user.
    pub username: String,

    /// Repository id sent with retrieval-augmented turns.
    pub repo_name: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            locale: Locale::English,
            username: "User".to_string(),
            repo_name: None,
        }
    }
}
