//! Collaborators on the editor side of the orchestrator.

use devpilot_core::{CodeReference, Locale, Message, MessageId, Selection};
use serde::Serialize;

/// Receives conversation snapshots and notifications for the chat panel.
///
/// Called with the conversation lock held: implementations must not call
/// back into the orchestrator.
pub trait PresentationBridge: Send + Sync {
    /// Show `messages` (system messages already removed).
    fn render(&self, messages: &[Message]);

    /// Deliver a non-render notification.
    fn post(&self, _event: PluginEvent) {}
}

/// Notifications pushed to the chat panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", content = "payload")]
pub enum PluginEvent {
    LocaleChanged {
        locale: Locale,
    },
    ThemeChanged {
        theme: String,
    },
    ConfigurationChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        locale: Option<Locale>,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    PresentCodeEmbeddedState {
        repo_embedded: bool,
        repo_name: String,
    },
}

/// Code action reported to usage tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CodeAction {
    Copy,
    Insert,
    Replace,
    NewFile,
}

/// The editor the assistant is embedded in.
pub trait EditorHost: Send + Sync {
    /// Current non-empty selection in the active editor.
    fn selected_code(&self) -> Option<CodeReference>;

    /// Ask the user to log in again.
    fn notify_login(&self);

    fn insert_at_caret(&self, _code: &str) {}

    fn replace_selection(&self, _code: &str) {}

    fn create_new_file(&self, _language: &str, _content: &str) {}

    /// Open a workspace-relative file.
    fn open_file(&self, _path: &str) {}

    fn goto_selection(&self, _file_url: Option<&str>, _selection: Selection) {}

    fn track_liking(&self, _message_id: &MessageId, _liked: bool) {}

    fn track_code_action(
        &self,
        _action: CodeAction,
        _message_id: &MessageId,
        _content: &str,
        _language: &str,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plugin_event_wire_shape() {
        let event = PluginEvent::PresentCodeEmbeddedState {
            repo_embedded: true,
            repo_name: "devpilot".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "command": "PresentCodeEmbeddedState",
                "payload": {"repoEmbedded": true, "repoName": "devpilot"}
            })
        );

        let event = PluginEvent::ConfigurationChanged {
            locale: None,
            username: Some("ada".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"command": "ConfigurationChanged", "payload": {"username": "ada"}})
        );
    }

    #[test]
    fn test_code_action_tags() {
        assert_eq!(serde_json::to_value(CodeAction::NewFile).unwrap(), json!("NEW_FILE"));
    }
}
