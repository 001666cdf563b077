//! Request and response bodies on the wire.

use devpilot_core::{Functionality, Locale, Message, Role};
use serde::{Deserialize, Serialize};

/// DevPilot protocol version tag.
pub const DEVPILOT_PROTOCOL_VERSION: &str = "V1";

/// Roles every backend accepts.
const ACCEPTED_ROLES: [Role; 3] = [Role::User, Role::Assistant, Role::System];

fn accepted(message: &Message) -> bool {
    ACCEPTED_ROLES.contains(&message.role)
}

/// DevPilot chat request body.
#[derive(Debug, Clone, Serialize)]
pub struct DevPilotRequest {
    pub version: &'static str,
    pub stream: bool,
    pub messages: Vec<DevPilotMessage>,
}

/// One message in a DevPilot request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevPilotMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_type: Option<Functionality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_data: Option<PromptData>,
    pub content: String,
}

/// Structured prompt metadata for functionality turns.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_context: Option<String>,
}

impl DevPilotRequest {
    pub fn new(messages: &[Message], stream: bool, locale: Locale) -> Self {
        Self {
            version: DEVPILOT_PROTOCOL_VERSION,
            stream,
            messages: messages
                .iter()
                .filter(|m| accepted(m))
                .map(|m| DevPilotMessage::from_message(m, locale))
                .collect(),
        }
    }
}

impl DevPilotMessage {
    /// Prompt data is only sent for functionality turns; in free chat the
    /// selected code is already inlined in the content.
    fn from_message(message: &Message, locale: Locale) -> Self {
        let code_ref = message.code_ref.as_ref().filter(|_| message.command_type.is_some());
        let prompt_data = code_ref.map(|code_ref| {
            let related: Vec<&str> = code_ref
                .related_symbols()
                .iter()
                .filter_map(|s| s.snippet.as_deref())
                .collect();
            PromptData {
                selected_code: Some(code_ref.source_code().to_string()),
                answer_language: Some(locale.answer_language().to_string()),
                language: Some(code_ref.language_id().to_string()),
                related_context: (!related.is_empty()).then(|| related.join("\n\n")),
            }
        });
        Self {
            role: message.role,
            command_type: message.command_type,
            prompt_data,
            content: message.model_text().to_string(),
        }
    }
}

/// OpenAI-compatible chat request body.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiRequest {
    pub messages: Vec<OpenAiMessage>,
    pub model: String,
    pub temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenAiMessage {
    pub role: Role,
    pub content: String,
}

impl OpenAiRequest {
    pub fn new(messages: &[Message], model: &str, stream: bool) -> Self {
        Self {
            messages: messages
                .iter()
                .filter(|m| accepted(m))
                .map(|m| OpenAiMessage {
                    role: m.role,
                    content: m.model_text().to_string(),
                })
                .collect(),
            model: model.to_string(),
            temperature: 0.7,
            stream,
        }
    }
}

/// Non-streaming completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub message: Option<CompletionMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Text of the first choice, empty if absent.
    pub fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default()
    }
}

/// Response of the repository embedding query.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingInfo {
    #[serde(default)]
    pub embedded: bool,
}
