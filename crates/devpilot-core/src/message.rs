//! Chat message types for conversation history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::functionality::Functionality;
use crate::ids::MessageId;

/// Content of the assistant message while waiting for the first delta.
pub const PLACEHOLDER_CONTENT: &str = "...";

/// Display name used for assistant messages.
pub const ASSISTANT_NAME: &str = "DevPilot";

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message (input/prompt).
    User,
    /// Assistant message (response).
    Assistant,
    /// System message (instructions).
    System,
    /// Session boundary; never sent to the model.
    Divider,
    /// Error notice shown in the chat.
    Error,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Divider => "divider",
            Role::Error => "error",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "divider" => Ok(Role::Divider),
            "error" => Ok(Role::Error),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Ok,
    Error,
}

/// A line/column position in a source file (1-based line, 0-based column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Selected range within a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

/// A symbol found near the selection by static analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolReference {
    pub name: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Snapshot of selected source code attached to a message.
///
/// Value object: built once by the editor host and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeReference {
    file_url: String,
    file_name: String,
    language_id: String,
    source_code: String,
    selection: Selection,
    #[serde(default)]
    related_symbols: Vec<SymbolReference>,
    #[serde(default = "default_visible")]
    visible: bool,
}

fn default_visible() -> bool {
    true
}

impl CodeReference {
    /// Create a code reference. The file name is derived from the last URL segment.
    pub fn new(
        file_url: impl Into<String>,
        language_id: impl Into<String>,
        source_code: impl Into<String>,
        selection: Selection,
    ) -> Self {
        let file_url = file_url.into();
        let file_name = file_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            file_url,
            file_name,
            language_id: language_id.into(),
            source_code: source_code.into(),
            selection,
            related_symbols: Vec::new(),
            visible: true,
        }
    }

    /// Builder method to attach related symbols.
    pub fn with_related_symbols(mut self, symbols: Vec<SymbolReference>) -> Self {
        self.related_symbols = symbols;
        self
    }

    /// Builder method to hide the reference in the chat panel.
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn file_url(&self) -> &str {
        &self.file_url
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn related_symbols(&self) -> &[SymbolReference] {
        &self.related_symbols
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique id; empty until the conversation assigns one.
    #[serde(default)]
    pub id: MessageId,
    /// Role of this message.
    pub role: Role,
    /// Displayed content.
    #[serde(default)]
    pub content: String,
    /// Text sent to the model when it differs from `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Selected code that triggered this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_ref: Option<CodeReference>,
    /// Functionality that produced this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_type: Option<Functionality>,
    /// True while the message is receiving streamed deltas.
    #[serde(default)]
    pub streaming: bool,
    /// Backend id of the completion being streamed into this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_id: Option<String>,
    /// Creation time.
    #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default)]
    pub username: String,
    /// Status marker: displayed, never sent to the model.
    #[serde(default)]
    pub marker: bool,
}

impl Message {
    /// Create a new chat message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content: content.into(),
            prompt: None,
            code_ref: None,
            command_type: None,
            streaming: false,
            streaming_id: None,
            time: Utc::now(),
            status: MessageStatus::Ok,
            username: String::new(),
            marker: false,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::User, content);
        msg.username = "User".to_string();
        msg
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.username = ASSISTANT_NAME.to_string();
        msg
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a session divider.
    pub fn divider() -> Self {
        Self::new(Role::Divider, "")
    }

    /// Create the assistant placeholder shown before the first delta.
    pub fn placeholder() -> Self {
        Self::assistant(PLACEHOLDER_CONTENT)
    }

    /// Create a status marker message (shown, never sent to the model).
    pub fn status_marker(role: Role, content: impl Into<String>) -> Self {
        let mut msg = match role {
            Role::User => Self::user(content),
            Role::Assistant => Self::assistant(content),
            other => Self::new(other, content),
        };
        msg.marker = true;
        msg
    }

    /// Builder method to set the model prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Builder method to attach a code reference.
    pub fn with_code_ref(mut self, code_ref: CodeReference) -> Self {
        self.code_ref = Some(code_ref);
        self
    }

    /// Builder method to set the functionality tag.
    pub fn with_command(mut self, functionality: Functionality) -> Self {
        self.command_type = Some(functionality);
        self
    }

    /// Text sent to the model for this message.
    pub fn model_text(&self) -> &str {
        self.prompt.as_deref().unwrap_or(&self.content)
    }

    pub fn is_divider(&self) -> bool {
        self.role == Role::Divider
    }
}

/// Partial update of a message.
///
/// Fields left as `None` are untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub prompt: Option<String>,
    pub streaming_id: Option<String>,
    pub status: Option<MessageStatus>,
    pub marker: Option<bool>,
}

impl MessagePatch {
    /// Patch replacing the content.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Builder method to set the streaming id.
    pub fn with_streaming_id(mut self, id: Option<String>) -> Self {
        self.streaming_id = id;
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Builder method to mark the message as a status marker.
    pub fn as_marker(mut self) -> Self {
        self.marker = Some(true);
        self
    }

    /// Merge the patch into a message.
    pub fn apply_to(self, message: &mut Message) {
        if let Some(content) = self.content {
            message.content = content;
        }
        if let Some(prompt) = self.prompt {
            message.prompt = Some(prompt);
        }
        if let Some(id) = self.streaming_id {
            message.streaming_id = Some(id);
        }
        if let Some(status) = self.status {
            message.status = status;
        }
        if let Some(marker) = self.marker {
            message.marker = marker;
        }
    }
}
