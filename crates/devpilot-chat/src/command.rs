//! Commands sent from the chat panel.

use devpilot_core::{Message, MessageId, Role, Selection};
use serde::Deserialize;

/// A command from the chat panel, as `{"command": ..., "payload": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", content = "payload")]
pub enum BridgeCommand {
    AppendToConversation(Message),
    InterruptChatStream,
    DeleteMessage(MessageRef),
    RegenerateMessage(MessageRef),
    ClearChatHistory,
    LikeMessage(MessageRef),
    DislikeMessage(MessageRef),
    InsertCodeAtCaret(CodePayload),
    ReplaceSelectedCode(CodePayload),
    CreateNewFile(CodePayload),
    CopyCode(CodePayload),
    OpenFile(CodePayload),
    GotoSelectedCode(GotoPayload),
    ExplainCode,
    FixCode,
    CommentCode,
    TestCode,
    CheckCodePerformance,
}

impl BridgeCommand {
    /// Parse a command from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Payload naming a message. Other message fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: MessageId,
}

/// Payload of code block actions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePayload {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_id: MessageId,
    #[serde(default, alias = "lang")]
    pub language: String,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Payload of `GotoSelectedCode`: a code reference as rendered.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoPayload {
    #[serde(default)]
    pub file_url: Option<String>,
    pub selection: Selection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_to_conversation() {
        let command = BridgeCommand::from_json(
            r#"{"command":"AppendToConversation","payload":{"role":"user","content":"hello","time":1700000000000}}"#,
        )
        .unwrap();
        match command {
            BridgeCommand::AppendToConversation(message) => {
                assert_eq!(message.role, Role::User);
                assert_eq!(message.content, "hello");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unit_commands() {
        assert!(matches!(
            BridgeCommand::from_json(r#"{"command":"InterruptChatStream"}"#).unwrap(),
            BridgeCommand::InterruptChatStream
        ));
        assert!(matches!(
            BridgeCommand::from_json(r#"{"command":"ExplainCode"}"#).unwrap(),
            BridgeCommand::ExplainCode
        ));
    }

    #[test]
    fn test_message_ref_ignores_extra_fields() {
        let command = BridgeCommand::from_json(
            r#"{"command":"DeleteMessage","payload":{"id":"m-1","role":"user","content":"x","streaming":false}}"#,
        )
        .unwrap();
        assert!(matches!(command, BridgeCommand::DeleteMessage(r) if r.id.as_str() == "m-1"));
    }

    #[test]
    fn test_code_payload_language_alias() {
        let command = BridgeCommand::from_json(
            r#"{"command":"CreateNewFile","payload":{"content":"fn main() {}","lang":"rust","messageId":"m-2"}}"#,
        )
        .unwrap();
        match command {
            BridgeCommand::CreateNewFile(payload) => {
                assert_eq!(payload.language, "rust");
                assert_eq!(payload.message_id.as_str(), "m-2");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_goto_payload_from_code_reference() {
        let command = BridgeCommand::from_json(
            r#"{"command":"GotoSelectedCode","payload":{"fileUrl":"file:///a.rs","fileName":"a.rs","selection":{"start":{"line":3,"column":0},"end":{"line":5,"column":1}}}}"#,
        )
        .unwrap();
        match command {
            BridgeCommand::GotoSelectedCode(payload) => {
                assert_eq!(payload.selection.end.line, 5);
                assert_eq!(payload.file_url.as_deref(), Some("file:///a.rs"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(BridgeCommand::from_json(r#"{"command":"Dance"}"#).is_err());
    }
}
