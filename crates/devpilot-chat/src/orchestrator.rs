//! Turn orchestration between the editor, the conversation and the provider.
//!
//! The [`Orchestrator`] owns one [`Conversation`] and drives every turn
//! through placeholder, streaming and settlement. Each in-flight call is tied
//! to a generation number; events from a superseded generation are dropped.
//!
//! The state lock is never held across an `.await`. Renders happen while it
//! is held so every snapshot matches the conversation at that instant.

use std::sync::Arc;

use devpilot_core::l10n::{self, TextKey};
use devpilot_core::message::PLACEHOLDER_CONTENT;
use devpilot_core::prompts::message_with_codeblock;
use devpilot_core::{
    CodeReference, Conversation, Functionality, Message, MessageId, MessagePatch, MessageStatus,
    Role,
};
use devpilot_llm::{
    ChatEvent, ChatHandle, ChatOptions, ChatResponse, Interrupter, LlmProvider, ProviderError,
};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::{CodeAction, EditorHost, PluginEvent, PresentationBridge};
use crate::command::BridgeCommand;
use crate::error::ChatError;
use crate::prompt::{build_functionality_messages, is_repo_query, strip_repo_marker};
use crate::settings::ChatSettings;

/// The call currently allowed to mutate the conversation.
struct ActiveTurn {
    generation: u64,
    message_id: MessageId,
    cancel: CancellationToken,
    interrupter: Option<Interrupter>,
}

impl ActiveTurn {
    fn stop(&self) {
        self.cancel.cancel();
        if let Some(interrupter) = &self.interrupter {
            interrupter.interrupt();
        }
    }
}

#[derive(Default)]
struct ChatState {
    conversation: Conversation,
    turn: Option<ActiveTurn>,
    generation: u64,
}

impl ChatState {
    fn is_current(&self, generation: u64) -> bool {
        self.turn
            .as_ref()
            .is_some_and(|turn| turn.generation == generation)
    }

    fn turn_targets(&self, id: &MessageId) -> bool {
        self.turn.as_ref().is_some_and(|turn| &turn.message_id == id)
    }

    /// Stop the current turn and settle its message.
    fn abort_turn(&mut self) {
        if let Some(turn) = self.turn.take() {
            turn.stop();
            self.conversation
                .apply_patch(&turn.message_id, MessagePatch::default(), false);
            self.conversation.set_active(None);
            debug!(generation = turn.generation, "Aborted turn");
        }
    }

    /// Consume the turn if it is still `generation`.
    fn take_turn(&mut self, generation: u64) -> Option<ActiveTurn> {
        if !self.is_current(generation) {
            debug!(generation, "Ignoring superseded turn");
            return None;
        }
        self.conversation.set_active(None);
        self.turn.take()
    }
}

/// A turn whose placeholder is in place, ready to call the provider.
struct PreparedTurn {
    generation: u64,
    context: Vec<Message>,
    options: ChatOptions,
}

struct Inner {
    state: Mutex<ChatState>,
    provider: RwLock<Arc<dyn LlmProvider>>,
    bridge: Arc<dyn PresentationBridge>,
    host: Arc<dyn EditorHost>,
    settings: RwLock<ChatSettings>,
}

/// Coordinates editor intents, the conversation and the provider.
///
/// Cloning yields another handle on the same conversation, so a turn can be
/// streamed on a spawned task while another handle interrupts it.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use devpilot_chat::{Orchestrator, PresentationBridge, EditorHost, ChatSettings};
/// # use devpilot_core::Message;
/// # async fn example(
/// #     provider: Arc<dyn devpilot_llm::LlmProvider>,
/// #     bridge: Arc<dyn PresentationBridge>,
/// #     host: Arc<dyn EditorHost>,
/// # ) -> Result<(), devpilot_chat::ChatError> {
/// let orchestrator = Orchestrator::new(provider, bridge, host, ChatSettings::default());
/// orchestrator
///     .append_user_message(Message::user("What does this crate do?"), None)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        bridge: Arc<dyn PresentationBridge>,
        host: Arc<dyn EditorHost>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ChatState::default()),
                provider: RwLock::new(provider),
                bridge,
                host,
                settings: RwLock::new(settings),
            }),
        }
    }

    /// Swap the provider used by later turns.
    pub fn set_provider(&self, provider: Arc<dyn LlmProvider>) {
        info!(provider = %provider.name(), "Switched provider");
        *self.inner.provider.write() = provider;
    }

    pub fn settings(&self) -> ChatSettings {
        self.inner.settings.read().clone()
    }

    /// Replace the settings and tell the chat panel what changed.
    pub fn update_settings(&self, settings: ChatSettings) {
        let previous = std::mem::replace(&mut *self.inner.settings.write(), settings.clone());
        if previous.locale != settings.locale {
            self.inner.bridge.post(PluginEvent::LocaleChanged {
                locale: settings.locale,
            });
        }
        if previous.locale != settings.locale || previous.username != settings.username {
            self.inner.bridge.post(PluginEvent::ConfigurationChanged {
                locale: Some(settings.locale),
                username: Some(settings.username),
            });
        }
    }

    /// Copy of the current messages, system messages included.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().conversation.messages().to_vec()
    }

    /// Push a snapshot of the conversation to the chat panel.
    pub fn render(&self) {
        let state = self.inner.state.lock();
        self.render_locked(&state);
    }

    /// Abort any turn and start over with an empty conversation.
    pub fn start_new_conversation(&self) {
        let mut state = self.inner.state.lock();
        state.abort_turn();
        state.conversation = Conversation::new();
        info!("Started new conversation");
        self.render_locked(&state);
    }

    /// Abort any turn, replace the conversation with `messages` and answer it.
    pub async fn start_conversation_with(&self, messages: Vec<Message>) {
        {
            let mut state = self.inner.state.lock();
            state.abort_turn();
            state.conversation = Conversation::with_messages(messages);
            self.render_locked(&state);
        }
        self.stream_answer().await;
    }

    /// Run a code action on `code_ref`, or on the editor selection when `None`.
    pub async fn start_functionality(
        &self,
        functionality: Functionality,
        code_ref: Option<CodeReference>,
    ) -> Result<(), ChatError> {
        let code_ref = code_ref
            .or_else(|| self.inner.host.selected_code())
            .ok_or(ChatError::NoSelection)?;
        let locale = self.inner.settings.read().locale;
        info!(functionality = %functionality, file = %code_ref.file_name(), "Starting code action");

        let mut messages = build_functionality_messages(functionality, code_ref, locale);
        let username = self.inner.settings.read().username.clone();
        for message in messages.iter_mut().filter(|m| m.role == Role::User) {
            message.username = username.clone();
        }
        self.start_conversation_with(messages).await;
        Ok(())
    }

    /// Append a user message and answer it.
    ///
    /// With `selected_code` the code is prepended to the message as a code
    /// block. A message containing `@repo` becomes a retrieval-augmented
    /// query and opens a new session.
    pub async fn append_user_message(
        &self,
        mut message: Message,
        selected_code: Option<CodeReference>,
    ) -> Result<(), ChatError> {
        if message.role != Role::User {
            return Err(ChatError::invalid_role("append", message.role));
        }

        if let Some(code_ref) = selected_code {
            message.content = message_with_codeblock(
                &message.content,
                code_ref.source_code(),
                code_ref.language_id(),
            );
            message.code_ref = Some(code_ref.hidden());
        }
        let rag = is_repo_query(message.model_text());
        if rag {
            message.prompt = Some(strip_repo_marker(message.model_text()));
        }
        message.username = self.inner.settings.read().username.clone();
        message.streaming = false;

        {
            let mut state = self.inner.state.lock();
            state.abort_turn();
            let id = state.conversation.add_message(message).id.clone();
            if rag && !state.conversation.last_message_is_first_in_session() {
                state.conversation.insert_before(&id, Message::divider());
            }
            self.render_locked(&state);
        }
        self.stream_answer().await;
        Ok(())
    }

    /// Answer the last session of the conversation.
    ///
    /// Returns once the turn has settled or been superseded.
    pub async fn stream_answer(&self) {
        if let Some(turn) = self.begin_turn() {
            self.run_turn(turn).await;
        }
    }

    /// Stop the streaming answer, keeping what has arrived so far.
    ///
    /// No-op when nothing is streaming.
    pub fn interrupt(&self) {
        let state = self.inner.state.lock();
        if let Some(turn) = &state.turn {
            info!(generation = turn.generation, "Interrupting chat stream");
            turn.stop();
        }
    }

    /// Delete a user message together with its answer.
    pub fn delete_message(&self, id: &MessageId) -> Result<(), ChatError> {
        let mut state = self.inner.state.lock();
        let role = state
            .conversation
            .get_message_by_id(id)
            .map(|m| m.role)
            .ok_or_else(|| ChatError::MessageNotFound(id.clone()))?;
        if role != Role::User {
            return Err(ChatError::invalid_role("delete", role));
        }

        let messages = state.conversation.messages();
        let answer_id = messages
            .iter()
            .position(|m| &m.id == id)
            .and_then(|index| messages.get(index + 1))
            .map(|m| m.id.clone());
        let streaming = state.turn_targets(id)
            || answer_id.as_ref().is_some_and(|answer| state.turn_targets(answer));
        if streaming {
            state.abort_turn();
        }

        state.conversation.delete_pair_message(id);
        debug!(message_id = %id, "Deleted message pair");
        self.render_locked(&state);
        Ok(())
    }

    /// Drop an assistant answer and ask for a new one.
    pub async fn regenerate_message(&self, id: &MessageId) -> Result<(), ChatError> {
        {
            let mut state = self.inner.state.lock();
            let role = state
                .conversation
                .get_message_by_id(id)
                .map(|m| m.role)
                .ok_or_else(|| ChatError::MessageNotFound(id.clone()))?;
            if role != Role::Assistant {
                return Err(ChatError::invalid_role("regenerate", role));
            }
            if state.turn_targets(id) {
                state.abort_turn();
            }
            state.conversation.delete_message(id);
            info!(message_id = %id, "Regenerating answer");
            self.render_locked(&state);
        }
        self.stream_answer().await;
        Ok(())
    }

    /// Close the current session. Earlier messages stay visible but are no
    /// longer sent to the model.
    pub fn clear_chat_history(&self) {
        let mut state = self.inner.state.lock();
        state.abort_turn();
        let needs_divider = state
            .conversation
            .last_message()
            .is_some_and(|last| !last.is_divider());
        if needs_divider {
            state.conversation.add_message(Message::divider());
        }
        self.render_locked(&state);
    }

    /// Remove every message.
    pub fn clear_all_history(&self) {
        let mut state = self.inner.state.lock();
        state.abort_turn();
        state.conversation.clear_all_messages();
        self.render_locked(&state);
    }

    /// Reflect a finished login attempt in the conversation.
    ///
    /// On failure the whole history is cleared.
    pub fn on_login(&self, username: Option<&str>) {
        let Some(username) = username else {
            warn!("Login failed, clearing history");
            self.clear_all_history();
            return;
        };

        let locale = self.inner.settings.read().locale;
        let mut state = self.inner.state.lock();
        state.conversation.add_message(Message::status_marker(
            Role::Assistant,
            format!("{}: {}", l10n::text(locale, TextKey::LoginSuccess), username),
        ));
        info!(username = %username, "Login succeeded");
        self.render_locked(&state);
    }

    /// Ask the provider whether the configured repository is indexed and
    /// tell the chat panel.
    pub async fn refresh_repo_state(&self) -> bool {
        let Some(repo) = self.inner.settings.read().repo_name.clone() else {
            return false;
        };
        let provider = self.inner.provider.read().clone();
        let embedded = match provider.is_repo_embedded(&repo).await {
            Ok(embedded) => embedded,
            Err(err) => {
                warn!(repo = %repo, error = %err, "Failed to query repository embedding state");
                false
            }
        };
        self.inner.bridge.post(PluginEvent::PresentCodeEmbeddedState {
            repo_embedded: embedded,
            repo_name: repo,
        });
        embedded
    }

    /// Ask for a commit message describing a staged diff.
    ///
    /// Runs outside the conversation and always waits for the complete
    /// answer. `None` means the request was cancelled.
    pub async fn generate_commit_message(
        &self,
        diff: &str,
        cancel: CancellationToken,
    ) -> Result<Option<String>, ChatError> {
        if diff.trim().is_empty() {
            return Err(ChatError::NoStagedChanges);
        }
        let provider = self.inner.provider.read().clone();
        let messages = [Message::user(diff).with_command(Functionality::GenerateCommit)];
        let options = ChatOptions::new(cancel.clone()).without_streaming();
        info!(provider = %provider.name(), chars = diff.len(), "Generating commit message");

        let result = match provider.chat(&messages, options).await {
            Ok(ChatResponse::Complete(text)) => Ok(Some(text)),
            Ok(ChatResponse::Streaming(handle)) => match handle.result().await {
                Ok(_) if cancel.is_cancelled() => Ok(None),
                Ok(text) => Ok(Some(text)),
                Err(err) => Err(err),
            },
            Ok(ChatResponse::Cancelled) => Ok(None),
            Err(err) => Err(err),
        };

        result.map_err(|err| {
            if err.is_unauthorized() {
                warn!(error = %err, "Commit message request unauthorized");
                self.inner.host.notify_login();
            } else {
                warn!(error = %err, "Commit message request failed");
            }
            ChatError::Provider(err)
        })
    }

    /// Parse and run a command from the chat panel.
    pub async fn handle_command_json(&self, json: &str) -> Result<(), ChatError> {
        let command = BridgeCommand::from_json(json)?;
        self.handle_command(command).await
    }

    /// Run a command from the chat panel.
    pub async fn handle_command(&self, command: BridgeCommand) -> Result<(), ChatError> {
        let host = &self.inner.host;
        match command {
            BridgeCommand::AppendToConversation(message) => {
                let selected = host.selected_code();
                self.append_user_message(message, selected).await
            }
            BridgeCommand::InterruptChatStream => {
                self.interrupt();
                Ok(())
            }
            BridgeCommand::DeleteMessage(target) => self.delete_message(&target.id),
            BridgeCommand::RegenerateMessage(target) => self.regenerate_message(&target.id).await,
            BridgeCommand::ClearChatHistory => {
                self.clear_chat_history();
                Ok(())
            }
            BridgeCommand::LikeMessage(target) => {
                host.track_liking(&target.id, true);
                Ok(())
            }
            BridgeCommand::DislikeMessage(target) => {
                host.track_liking(&target.id, false);
                Ok(())
            }
            BridgeCommand::InsertCodeAtCaret(code) => {
                host.insert_at_caret(&code.content);
                host.track_code_action(CodeAction::Insert, &code.message_id, &code.content, &code.language);
                Ok(())
            }
            BridgeCommand::ReplaceSelectedCode(code) => {
                host.replace_selection(&code.content);
                host.track_code_action(CodeAction::Replace, &code.message_id, &code.content, &code.language);
                Ok(())
            }
            BridgeCommand::CreateNewFile(code) => {
                host.create_new_file(&code.language, &code.content);
                host.track_code_action(CodeAction::NewFile, &code.message_id, &code.content, &code.language);
                Ok(())
            }
            BridgeCommand::CopyCode(code) => {
                // Copying happens in the panel; only answers are tracked.
                if code.role == Some(Role::Assistant) {
                    host.track_code_action(CodeAction::Copy, &code.message_id, &code.content, &code.language);
                }
                Ok(())
            }
            BridgeCommand::OpenFile(code) => {
                host.open_file(&code.content);
                Ok(())
            }
            BridgeCommand::GotoSelectedCode(target) => {
                host.goto_selection(target.file_url.as_deref(), target.selection);
                Ok(())
            }
            BridgeCommand::ExplainCode => self.start_functionality(Functionality::ExplainCode, None).await,
            BridgeCommand::FixCode => self.start_functionality(Functionality::FixCode, None).await,
            BridgeCommand::CommentCode => self.start_functionality(Functionality::CommentCode, None).await,
            BridgeCommand::TestCode => self.start_functionality(Functionality::GenerateTest, None).await,
            BridgeCommand::CheckCodePerformance => {
                self.start_functionality(Functionality::CheckPerformance, None).await
            }
        }
    }

    fn render_locked(&self, state: &ChatState) {
        self.inner.bridge.render(&state.conversation.snapshot());
    }

    /// Abort the previous turn, insert the placeholder and compute the
    /// request. `None` when there is nothing to answer.
    fn begin_turn(&self) -> Option<PreparedTurn> {
        let repo_name = self.inner.settings.read().repo_name.clone();
        let mut state = self.inner.state.lock();
        state.abort_turn();

        let context = model_context(&state.conversation);
        let Some(question) = context.iter().rev().find(|m| m.role == Role::User) else {
            debug!("No user message to answer");
            return None;
        };
        let repo = if is_repo_query(&question.content) {
            if repo_name.is_none() {
                warn!("Repository query without a configured repository");
            }
            repo_name
        } else {
            None
        };

        state.generation += 1;
        let generation = state.generation;
        let mut placeholder = Message::placeholder();
        placeholder.streaming = true;
        let message_id = state.conversation.add_message(placeholder).id.clone();
        state.conversation.set_active(Some(message_id.clone()));

        let cancel = CancellationToken::new();
        state.turn = Some(ActiveTurn {
            generation,
            message_id,
            cancel: cancel.clone(),
            interrupter: None,
        });
        self.render_locked(&state);

        let mut options = ChatOptions::new(cancel);
        if let Some(repo) = repo {
            options = options.with_repo(repo);
        }
        Some(PreparedTurn {
            generation,
            context,
            options,
        })
    }

    async fn run_turn(&self, turn: PreparedTurn) {
        let provider = self.inner.provider.read().clone();
        info!(
            provider = %provider.name(),
            generation = turn.generation,
            messages = turn.context.len(),
            rag = turn.options.repo.is_some(),
            "Dispatching chat turn"
        );

        match provider.chat(&turn.context, turn.options).await {
            Ok(ChatResponse::Complete(text)) => self.settle(turn.generation, Ok(text)),
            Ok(ChatResponse::Streaming(handle)) => self.consume(turn.generation, handle).await,
            Ok(ChatResponse::Cancelled) => self.settle_cancelled(turn.generation),
            Err(err) => self.settle(turn.generation, Err(err)),
        }
    }

    async fn consume(&self, generation: u64, mut handle: ChatHandle) {
        if !self.attach_interrupter(generation, handle.interrupter()) {
            handle.interrupt();
            return;
        }
        while let Some(event) = handle.next_event().await {
            if !self.apply_event(generation, event) {
                handle.interrupt();
                return;
            }
        }
        let result = handle.result().await;
        self.settle(generation, result);
    }

    fn attach_interrupter(&self, generation: u64, interrupter: Interrupter) -> bool {
        let mut state = self.inner.state.lock();
        match state.turn.as_mut() {
            Some(turn) if turn.generation == generation => {
                turn.interrupter = Some(interrupter);
                true
            }
            _ => false,
        }
    }

    /// Apply a streamed event. False once the turn has been superseded.
    fn apply_event(&self, generation: u64, event: ChatEvent) -> bool {
        let mut state = self.inner.state.lock();
        let Some(message_id) = state
            .turn
            .as_ref()
            .filter(|turn| turn.generation == generation)
            .map(|turn| turn.message_id.clone())
        else {
            debug!(generation, "Dropping event of superseded turn");
            return false;
        };

        match event {
            ChatEvent::Text { text, id } => {
                let patch = MessagePatch::content(text).with_streaming_id(id);
                state.conversation.apply_patch(&message_id, patch, true);
            }
            ChatEvent::Interrupted => {
                debug!(generation, "Chat stream interrupted");
                state
                    .conversation
                    .apply_patch(&message_id, MessagePatch::default(), false);
            }
        }
        self.render_locked(&state);
        true
    }

    fn settle_cancelled(&self, generation: u64) {
        let mut state = self.inner.state.lock();
        if let Some(turn) = state.take_turn(generation) {
            debug!(generation, "Chat request cancelled");
            state
                .conversation
                .apply_patch(&turn.message_id, MessagePatch::default(), false);
            self.render_locked(&state);
        }
    }

    fn settle(&self, generation: u64, result: Result<String, ProviderError>) {
        let settings = self.inner.settings.read().clone();
        let mut state = self.inner.state.lock();
        let Some(turn) = state.take_turn(generation) else {
            return;
        };

        match result {
            Ok(text) => {
                debug!(generation, chars = text.chars().count(), "Chat turn completed");
                let patch = if text.is_empty() {
                    MessagePatch::default()
                } else {
                    MessagePatch::content(text)
                };
                state.conversation.apply_patch(&turn.message_id, patch, false);
                self.render_locked(&state);
            }
            Err(err) if err.is_unauthorized() => {
                warn!(error = %err, "Chat request unauthorized");
                let failure = MessagePatch::content(l10n::text(settings.locale, TextKey::LoginFail))
                    .as_marker();
                state
                    .conversation
                    .apply_patch(&turn.message_id, failure, false);
                let mut retry =
                    Message::status_marker(Role::User, l10n::text(settings.locale, TextKey::ChatLogin));
                retry.username = settings.username;
                state.conversation.add_message(retry);
                self.render_locked(&state);
                drop(state);
                self.inner.host.notify_login();
            }
            Err(err) => {
                warn!(error = %err, timeout = err.is_timeout(), "Chat request failed");
                let patch = MessagePatch::content(err.to_string()).with_status(MessageStatus::Error);
                state.conversation.apply_patch(&turn.message_id, patch, false);
                self.render_locked(&state);
            }
        }
    }
}

/// Messages sent to the model for the next answer.
///
/// The last session without meta messages, led by the conversation's
/// system message when it has one.
fn model_context(conversation: &Conversation) -> Vec<Message> {
    let mut context: Vec<Message> = conversation
        .last_session_messages()
        .iter()
        .filter(|m| is_model_visible(m))
        .cloned()
        .collect();

    if let Some(system) = conversation
        .messages()
        .first()
        .filter(|m| m.role == Role::System)
    {
        if context.first().map(|m| &m.id) != Some(&system.id) {
            context.insert(0, system.clone());
        }
    }
    context
}

fn is_model_visible(message: &Message) -> bool {
    match message.role {
        Role::Divider | Role::Error => false,
        _ if message.marker || message.status == MessageStatus::Error => false,
        Role::Assistant => message.content != PLACEHOLDER_CONTENT,
        _ => true,
    }
}
