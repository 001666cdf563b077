//! Message construction for turns started by the orchestrator.

use chrono::Utc;
use devpilot_core::prompts::{functionality_prompt, system_prompt};
use devpilot_core::{CodeReference, Functionality, Locale, Message};

/// Marker in user text that turns a message into a retrieval-augmented query.
pub const REPO_MARKER: &str = "@repo";

/// The built-in system message.
pub fn build_system_message(locale: Locale) -> Message {
    Message::system(system_prompt(locale, Utc::now()))
}

/// Initial `[system, user]` messages for a code action on `code_ref`.
///
/// The user message displays the localized action label and sends the full
/// templated prompt.
pub fn build_functionality_messages(
    functionality: Functionality,
    code_ref: CodeReference,
    locale: Locale,
) -> Vec<Message> {
    let prompt = functionality_prompt(
        functionality,
        code_ref.language_id(),
        code_ref.source_code(),
        locale,
    );
    tracing::debug!(functionality = %functionality, prompt_len = prompt.len(), "Built functionality prompt");

    vec![
        build_system_message(locale),
        Message::user(functionality.label(locale))
            .with_prompt(prompt)
            .with_code_ref(code_ref)
            .with_command(functionality),
    ]
}

/// True if `text` asks for a retrieval-augmented answer.
pub fn is_repo_query(text: &str) -> bool {
    text.contains(REPO_MARKER)
}

/// `text` with the repository marker removed.
pub fn strip_repo_marker(text: &str) -> String {
    text.replace(REPO_MARKER, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use devpilot_core::{Role, Selection};

    #[test]
    fn test_functionality_messages() {
        let code_ref = CodeReference::new("file:///a.rs", "rust", "foo()", Selection::default());
        let messages =
            build_functionality_messages(Functionality::FixCode, code_ref, Locale::English);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        let user = &messages[1];
        assert_eq!(user.content, "Fix this");
        assert_eq!(user.command_type, Some(Functionality::FixCode));
        assert!(user.model_text().contains("```rust\nfoo()\n```"));
        assert!(user.code_ref.is_some());
    }

    #[test]
    fn test_repo_marker() {
        assert!(is_repo_query("@repo where is the parser?"));
        assert!(!is_repo_query("where is the parser?"));
        assert_eq!(strip_repo_marker("@repo where is the parser?"), "where is the parser?");
    }
}
