//! Live handle on a streaming chat call.
//!
//! A [`ChatHandle`] pairs a finite event channel with a single final result.
//! The producing side is a [`ChatSender`], owned by the task reading the
//! response body.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

/// Event produced while an answer streams in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Accumulated answer text so far, with the backend completion id.
    Text { text: String, id: Option<String> },
    /// The stream was interrupted before it completed. Sent at most once.
    Interrupted,
}

/// Cooperative interrupt control shared between a handle and its reader.
///
/// Cloning yields the same control. Interrupting twice is the same as once.
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    token: CancellationToken,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupter that also fires when `parent` is cancelled.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    pub fn interrupt(&self) {
        self.token.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until interrupted.
    pub async fn interrupted(&self) {
        self.token.cancelled().await;
    }
}

/// Consumer side of a streaming call.
#[derive(Debug)]
pub struct ChatHandle {
    events: mpsc::UnboundedReceiver<ChatEvent>,
    result: oneshot::Receiver<Result<String, ProviderError>>,
    interrupter: Interrupter,
    provider: String,
}

impl ChatHandle {
    /// Create a connected sender/handle pair.
    pub fn channel(provider: impl Into<String>, interrupter: Interrupter) -> (ChatSender, ChatHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let sender = ChatSender {
            events: events_tx,
            result: Some(result_tx),
            interrupted_sent: false,
        };
        let handle = ChatHandle {
            events: events_rx,
            result: result_rx,
            interrupter,
            provider: provider.into(),
        };
        (sender, handle)
    }

    /// Next streamed event; `None` once the stream has finished.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.events.recv().await
    }

    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    pub fn interrupt(&self) {
        self.interrupter.interrupt();
    }

    /// Wait for the full answer text.
    ///
    /// Resolves after the stream reports done or interruption. Undelivered
    /// events are discarded.
    pub async fn result(self) -> Result<String, ProviderError> {
        match self.result.await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Transport {
                provider: self.provider,
                message: "stream closed without a result".to_string(),
            }),
        }
    }
}

/// Producer side of a streaming call.
#[derive(Debug)]
pub struct ChatSender {
    events: mpsc::UnboundedSender<ChatEvent>,
    result: Option<oneshot::Sender<Result<String, ProviderError>>>,
    interrupted_sent: bool,
}

impl ChatSender {
    pub fn send_text(&self, text: impl Into<String>, id: Option<String>) {
        // The handle may already be gone; events are then dropped.
        let _ = self.events.send(ChatEvent::Text {
            text: text.into(),
            id,
        });
    }

    /// Signal interruption. Only the first call has an effect.
    pub fn send_interrupted(&mut self) {
        if !self.interrupted_sent {
            self.interrupted_sent = true;
            let _ = self.events.send(ChatEvent::Interrupted);
        }
    }

    /// Resolve the handle's result and close the event channel.
    pub fn finish(mut self, result: Result<String, ProviderError>) {
        if let Some(tx) = self.result.take() {
            let _ = tx.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_then_result() {
        let (mut sender, mut handle) = ChatHandle::channel("test", Interrupter::new());
        sender.send_text("It ", Some("c1".to_string()));
        sender.send_text("It works", Some("c1".to_string()));
        sender.send_interrupted();
        sender.send_interrupted();
        sender.finish(Ok("It works".to_string()));

        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], ChatEvent::Interrupted);
        assert_eq!(handle.result().await.unwrap(), "It works");
    }

    #[tokio::test]
    async fn test_dropped_sender_settles_result() {
        let (sender, handle) = ChatHandle::channel("test", Interrupter::new());
        drop(sender);
        assert!(handle.result().await.is_err());
    }

    #[test]
    fn test_interrupter_follows_parent() {
        let parent = CancellationToken::new();
        let interrupter = Interrupter::child_of(&parent);
        assert!(!interrupter.is_interrupted());
        parent.cancel();
        assert!(interrupter.is_interrupted());

        let local = Interrupter::child_of(&CancellationToken::new());
        local.interrupt();
        local.interrupt();
        assert!(local.is_interrupted());
    }
}
