//! Chat orchestration for DevPilot.
//!
//! The [`Orchestrator`] turns chat panel commands into conversation turns:
//! it keeps the [`Conversation`](devpilot_core::Conversation), calls the
//! configured [`LlmProvider`](devpilot_llm::LlmProvider) and pushes every
//! state change to a [`PresentationBridge`].

pub mod bridge;
pub mod command;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod settings;

pub use bridge::{CodeAction, EditorHost, PluginEvent, PresentationBridge};
pub use command::{BridgeCommand, CodePayload, GotoPayload, MessageRef};
pub use error::ChatError;
pub use orchestrator::Orchestrator;
pub use settings::ChatSettings;
