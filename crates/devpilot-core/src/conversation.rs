//! Ordered message history for a chat session.
//!
//! A [`Conversation`] is owned by whoever drives the chat (the orchestrator
//! in production, plain values in tests). Dividers partition the history into
//! sessions; only the last session is sent to the model.

use crate::ids::MessageId;
use crate::message::{Message, MessagePatch, Role};

/// Ordered sequence of messages plus the id of the message being streamed.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    active: Option<MessageId>,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation seeded with messages.
    ///
    /// Messages without an id (or with a duplicate one) get a fresh id.
    pub fn with_messages(messages: Vec<Message>) -> Self {
        let mut conversation = Self::new();
        for message in messages {
            conversation.add_message(message);
        }
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Remove every message.
    pub fn clear_all_messages(&mut self) {
        self.messages.clear();
        self.active = None;
    }

    /// Append a message, assigning an id if it has none. Returns the stored message.
    pub fn add_message(&mut self, mut message: Message) -> &Message {
        if message.id.is_empty() || self.position(&message.id).is_some() {
            message.id = MessageId::generate();
        }
        self.messages.push(message);
        let index = self.messages.len() - 1;
        &self.messages[index]
    }

    pub fn get_message_by_id(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// The message immediately preceding `id`.
    pub fn get_prev_message_by_id(&self, id: &MessageId) -> Option<&Message> {
        let index = self.position(id)?;
        index.checked_sub(1).map(|prev| &self.messages[prev])
    }

    /// Remove a user message together with the message right after it.
    ///
    /// Pairing is by adjacency: under normal flow an answer always directly
    /// follows its question. The second element is `None` when the message
    /// was the last one.
    pub fn delete_pair_message(&mut self, id: &MessageId) -> Option<(Message, Option<Message>)> {
        let index = self.position(id)?;
        let first = self.messages.remove(index);
        let second = (index < self.messages.len()).then(|| self.messages.remove(index));
        self.clear_active_if_removed();
        Some((first, second))
    }

    /// Remove a single message. Returns it with the index it occupied.
    pub fn delete_message(&mut self, id: &MessageId) -> Option<(Message, usize)> {
        let index = self.position(id)?;
        let removed = self.messages.remove(index);
        self.clear_active_if_removed();
        Some((removed, index))
    }

    /// Merge fields into the last message and set its streaming flag.
    pub fn replace_to_last_message(&mut self, patch: MessagePatch, streaming: bool) {
        if let Some(last) = self.messages.last_mut() {
            patch.apply_to(last);
            last.streaming = streaming;
        }
    }

    /// Stop streaming on the last message, optionally merging final fields.
    pub fn interrupt_last_message(&mut self, patch: Option<MessagePatch>) {
        if let Some(last) = self.messages.last_mut() {
            if let Some(patch) = patch {
                patch.apply_to(last);
            }
            last.streaming = false;
        }
    }

    /// Merge fields into the message with `id` and set its streaming flag.
    ///
    /// Returns false if no such message exists.
    pub fn apply_patch(&mut self, id: &MessageId, patch: MessagePatch, streaming: bool) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == id) {
            Some(message) => {
                patch.apply_to(message);
                message.streaming = streaming;
                true
            }
            None => false,
        }
    }

    /// Insert `message` right before the message with id `target`.
    ///
    /// Appends when the target is not found.
    pub fn insert_before(&mut self, target: &MessageId, mut message: Message) {
        if message.id.is_empty() || self.position(&message.id).is_some() {
            message.id = MessageId::generate();
        }
        match self.position(target) {
            Some(index) => self.messages.insert(index, message),
            None => self.messages.push(message),
        }
    }

    /// Messages after the last divider, or all messages if there is none.
    pub fn last_session_messages(&self) -> &[Message] {
        match self.messages.iter().rposition(Message::is_divider) {
            Some(index) => &self.messages[index + 1..],
            None => &self.messages,
        }
    }

    /// True if the last message opens a session.
    ///
    /// That is: at most one message, or the last or second-to-last message
    /// is a divider.
    pub fn last_message_is_first_in_session(&self) -> bool {
        let len = self.messages.len();
        if len <= 1 {
            return true;
        }
        self.messages[len - 1].is_divider() || self.messages[len - 2].is_divider()
    }

    /// Mark the message receiving the current stream.
    pub fn set_active(&mut self, id: Option<MessageId>) {
        self.active = id;
    }

    pub fn active_id(&self) -> Option<&MessageId> {
        self.active.as_ref()
    }

    /// The message currently streaming, if any.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.streaming)
    }

    /// Render view of the conversation: system messages removed.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect()
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.messages.iter().position(|m| &m.id == id)
    }

    fn clear_active_if_removed(&mut self) {
        if let Some(active) = &self.active {
            if self.position(active).is_none() {
                self.active = None;
            }
        }
    }
}
