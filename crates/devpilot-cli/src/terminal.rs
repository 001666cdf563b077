//! Terminal implementations of the chat panel and the editor host.

use std::io::Write;
use std::path::Path;

use devpilot_chat::{EditorHost, PluginEvent, PresentationBridge};
use devpilot_core::message::PLACEHOLDER_CONTENT;
use devpilot_core::{CodeReference, Message, MessageId, Position, Role, Selection};
use parking_lot::Mutex;
use tracing::warn;

#[derive(Default)]
struct Printed {
    id: Option<MessageId>,
    text: String,
    finished: bool,
}

/// Prints answers to stdout as they stream in.
#[derive(Default)]
pub struct TerminalBridge {
    printed: Mutex<Printed>,
}

impl PresentationBridge for TerminalBridge {
    fn render(&self, messages: &[Message]) {
        let Some(last) = messages.last() else {
            return;
        };
        let printable = last.role == Role::Assistant || (last.role == Role::User && last.marker);
        if !printable {
            return;
        }

        let mut printed = self.printed.lock();
        if printed.id.as_ref() != Some(&last.id) {
            *printed = Printed {
                id: Some(last.id.clone()),
                ..Default::default()
            };
        }
        if printed.finished {
            return;
        }

        let mut out = std::io::stdout().lock();
        if last.content != PLACEHOLDER_CONTENT {
            match last.content.strip_prefix(printed.text.as_str()) {
                Some(rest) => {
                    let _ = write!(out, "{}", rest);
                }
                None => {
                    let _ = write!(out, "\n{}", last.content);
                }
            }
            printed.text = last.content.clone();
        }
        if !last.streaming {
            let _ = writeln!(out);
            printed.finished = true;
        }
        let _ = out.flush();
    }

    fn post(&self, event: PluginEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => eprintln!("[devpilot] {}", json),
            Err(e) => warn!(error = %e, "Failed to serialize event"),
        }
    }
}

/// Editor host for a terminal session: code comes from files named on the
/// command line, edits are not supported.
pub struct TerminalHost;

impl EditorHost for TerminalHost {
    fn selected_code(&self) -> Option<CodeReference> {
        None
    }

    fn notify_login(&self) {
        warn!("Login required");
        eprintln!("Login required: set DEVPILOT_TOKEN and restart.");
    }
}

/// Editor language id for a file name.
pub fn language_id(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "rs" => "rust",
        "py" => "python",
        "ts" => "typescript",
        "tsx" => "typescriptreact",
        "js" => "javascript",
        "jsx" => "javascriptreact",
        "kt" => "kotlin",
        "sh" => "shellscript",
        "md" => "markdown",
        "" => "plaintext",
        other => return other.to_string(),
    }
    .to_string()
}

/// Reference to the whole of `source`, read from `path`.
pub fn code_reference(path: &Path, language: Option<String>, source: String) -> CodeReference {
    let lines: Vec<&str> = source.lines().collect();
    let end = Position::new(
        lines.len().max(1) as u32,
        lines.last().map(|l| l.chars().count()).unwrap_or_default() as u32,
    );
    let selection = Selection {
        start: Position::new(1, 0),
        end,
    };
    let language = language.unwrap_or_else(|| language_id(path));
    CodeReference::new(
        format!("file://{}", path.display()),
        language,
        source,
        selection,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_id() {
        assert_eq!(language_id(Path::new("src/main.rs")), "rust");
        assert_eq!(language_id(Path::new("App.TSX")), "typescriptreact");
        assert_eq!(language_id(Path::new("build.gradle")), "gradle");
        assert_eq!(language_id(Path::new("Makefile")), "plaintext");
    }

    #[test]
    fn test_code_reference_covers_file() {
        let code_ref = code_reference(
            Path::new("/tmp/lib.rs"),
            None,
            "fn a() {}\nfn bb() {}".to_string(),
        );
        assert_eq!(code_ref.file_name(), "lib.rs");
        assert_eq!(code_ref.language_id(), "rust");
        assert_eq!(code_ref.selection().end, Position::new(2, 10));
    }

    #[test]
    fn test_bridge_tracks_streamed_message() {
        let bridge = TerminalBridge::default();
        let mut answer = Message::placeholder();
        answer.streaming = true;
        bridge.render(&[answer.clone()]);
        assert_eq!(bridge.printed.lock().text, "");

        answer.content = "It ".to_string();
        bridge.render(&[answer.clone()]);
        answer.content = "It works".to_string();
        answer.streaming = false;
        bridge.render(&[answer.clone()]);

        let printed = bridge.printed.lock();
        assert_eq!(printed.text, "It works");
        assert!(printed.finished);
    }
}
