//! Turns decoded stream events into answer text on a [`ChatHandle`].

use futures_util::Stream;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ProviderError, StreamError};
use crate::handle::{ChatHandle, ChatSender, Interrupter};
use crate::sse::{read_event_stream, StreamHandler, StreamOutcome};

/// Accumulates deltas from completion events.
struct StreamCollector {
    provider: String,
    sender: ChatSender,
    text: String,
    id: Option<String>,
    render_rag: bool,
    rag_rendered: bool,
    error: Option<StreamError>,
}

impl StreamCollector {
    fn new(provider: &str, sender: ChatSender, render_rag: bool) -> Self {
        Self {
            provider: provider.to_string(),
            sender,
            text: String::new(),
            id: None,
            render_rag,
            rag_rendered: false,
            error: None,
        }
    }

    fn finish(self, outcome: StreamOutcome) {
        let result = match outcome {
            StreamOutcome::Done | StreamOutcome::Interrupted => Ok(self.text),
            StreamOutcome::Failed => Err(ProviderError::Transport {
                provider: self.provider,
                message: self
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "stream failed".to_string()),
            }),
        };
        self.sender.finish(result);
    }
}

impl StreamHandler for StreamCollector {
    fn on_progress(&mut self, event: Value) {
        let mut changed = false;

        if self.render_rag && !self.rag_rendered {
            if let Some(files) = event.pointer("/rag/files").and_then(Value::as_array) {
                self.rag_rendered = true;
                if !files.is_empty() {
                    self.text.insert_str(0, &render_rag_files(files));
                    changed = true;
                }
            }
        }

        if let Some(id) = event.get("id").and_then(Value::as_str) {
            self.id = Some(id.to_string());
        }

        if let Some(delta) = event
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
        {
            if !delta.is_empty() {
                self.text.push_str(delta);
                changed = true;
            }
        }

        if changed {
            self.sender.send_text(self.text.clone(), self.id.clone());
        }
    }

    fn on_done(&mut self) {
        debug!(provider = %self.provider, chars = self.text.len(), "Stream completed");
    }

    fn on_interrupted(&mut self) {
        debug!(provider = %self.provider, "Stream interrupted");
        self.sender.send_interrupted();
    }

    fn on_error(&mut self, err: StreamError) {
        warn!(provider = %self.provider, error = %err, "Stream failed");
        self.error = Some(err);
    }
}

/// Render the retrieval file list shown ahead of a RAG answer.
fn render_rag_files(files: &[Value]) -> String {
    let items: String = files
        .iter()
        .filter_map(|file| match file {
            Value::String(path) => Some(path.as_str()),
            Value::Object(map) => ["path", "name", "url"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str)),
            _ => None,
        })
        .map(|path| format!("<li>{}</li>", path))
        .collect();
    format!("<div class=\"rag-files\"><ul>{}</ul></div>\n\n", items)
}

/// Spawn the task reading `body` and return the handle it feeds.
///
/// The reader stops when `interrupter` fires.
pub(crate) fn stream_chat<S, B, E>(
    provider: &str,
    body: S,
    interrupter: Interrupter,
    render_rag: bool,
) -> ChatHandle
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (sender, handle) = ChatHandle::channel(provider, interrupter.clone());
    let mut collector = StreamCollector::new(provider, sender, render_rag);

    tokio::spawn(async move {
        let outcome = read_event_stream(body, &mut collector, &interrupter).await;
        collector.finish(outcome);
    });

    handle
}
