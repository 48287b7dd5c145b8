//! Conversation model on top of the connection manager.
//!
//! A [`Conversation`] keeps the message list of one chat session in memory.
//! Submitting a question appends the user's message and an empty assistant
//! message, then sends the question through the [`ConnectionManager`]. Every
//! streamed chunk is appended to that assistant message until the
//! end-of-stream marker arrives. Errors reported while a response is streaming
//! replace its content with a user-facing explanation and follow-up prompts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use streamchat_core::logging::targets;
use streamchat_core::{ConnectionGuard, Signal};
use streamchat_net::{ChatError, ConnectionManager, ErrorKind, END_OF_STREAM};

use crate::config::ConversationSettings;
use crate::error::ConversationError;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Identifier of one message in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Id of the greeting message.
    pub fn initial() -> Self {
        Self("initial".to_string())
    }

    /// A fresh id of the form `msg_<unix millis>_<9 base36 chars>`.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect();
        Self(format!("msg_{}_{suffix}", Utc::now().timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// The assistant placeholder has not received its first chunk yet.
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default)]
    pub suggested_questions: Vec<String>,
}

impl ChatMessage {
    fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            is_loading: false,
            suggested_questions: Vec::new(),
        }
    }
}

/// User-facing text for an error, with prompts the user can pick next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorNotice {
    pub message: String,
    pub suggested_questions: Vec<String>,
}

impl ErrorNotice {
    /// Map an error to what the user sees.
    pub fn for_error(error: &ChatError) -> Self {
        match error.kind() {
            ErrorKind::BackendInitialization => Self {
                message: "The server's database failed to initialize. Please try again in a moment."
                    .to_string(),
                suggested_questions: vec![
                    "Shall we try again in a moment?".to_string(),
                    "Shall we check the server status?".to_string(),
                    "Shall we try a different question?".to_string(),
                ],
            },
            _ => Self {
                message: "Sorry, something went wrong while talking to the server.".to_string(),
                suggested_questions: vec![
                    "Shall we try again?".to_string(),
                    "Shall we try a different question?".to_string(),
                    "Shall we try again in a moment?".to_string(),
                ],
            },
        }
    }
}

#[derive(Default)]
struct State {
    messages: Vec<ChatMessage>,
    /// Assistant message receiving the current (or last) response.
    current: Option<MessageId>,
    /// Text accumulated for `current`.
    response: String,
    is_loading: bool,
    last_error: Option<ErrorNotice>,
}

impl State {
    fn message_mut(&mut self, id: &MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    /// Append a chunk to the open response. Returns the id to notify about.
    fn apply_chunk(&mut self, chunk: &str) -> Option<MessageId> {
        let id = self.current.clone()?;
        if !self.response.ends_with(chunk) {
            self.response.push_str(chunk);
        }
        let content = self.response.clone();
        let message = self.message_mut(&id)?;
        message.content = content;
        message.is_loading = false;
        Some(id)
    }

    /// Replace the open response with an error notice.
    fn apply_error(&mut self, notice: ErrorNotice) -> Option<MessageId> {
        self.last_error = Some(notice.clone());
        if !self.is_loading {
            return None;
        }
        self.is_loading = false;
        let id = self.current.clone()?;
        let message = self.message_mut(&id)?;
        message.content = notice.message;
        message.suggested_questions = notice.suggested_questions;
        message.is_loading = false;
        Some(id)
    }
}

struct Inner {
    state: Mutex<State>,
    message_updated: Signal<MessageId>,
    response_finished: Signal<MessageId>,
}

impl Inner {
    fn on_chunk(&self, chunk: &str) {
        if chunk == END_OF_STREAM {
            let finished = {
                let mut state = self.state.lock();
                if !std::mem::replace(&mut state.is_loading, false) {
                    None
                } else {
                    state.current.clone()
                }
            };
            if let Some(id) = finished {
                tracing::debug!(target: targets::CONVERSATION, %id, "response finished");
                self.response_finished.emit(id);
            }
            return;
        }

        let updated = self.state.lock().apply_chunk(chunk);
        match updated {
            Some(id) => {
                self.message_updated.emit(id);
            }
            None => {
                tracing::debug!(target: targets::CONVERSATION, "chunk without an open response, ignoring");
            }
        }
    }

    fn on_error(&self, error: &ChatError) {
        let notice = ErrorNotice::for_error(error);
        let updated = self.state.lock().apply_error(notice);
        match updated {
            Some(id) => {
                tracing::warn!(target: targets::CONVERSATION, %id, %error, "response failed");
                self.message_updated.emit(id.clone());
                self.response_finished.emit(id);
            }
            None => {
                tracing::debug!(target: targets::CONVERSATION, %error, "error outside a response");
            }
        }
    }
}

/// One chat session.
///
/// # Signals
///
/// - `message_updated`: a message's content or suggestions changed
/// - `response_finished`: the open response completed or failed
///
/// Signals are emitted from the connection manager's task.
pub struct Conversation {
    manager: Arc<ConnectionManager>,
    inner: Arc<Inner>,
    _chunk_guard: ConnectionGuard<String>,
    _error_guard: ConnectionGuard<ChatError>,
}

impl Conversation {
    /// Start a conversation that talks through `manager`.
    pub fn new(manager: Arc<ConnectionManager>, settings: &ConversationSettings) -> Self {
        let mut greeting = ChatMessage::new(MessageId::initial(), Role::Assistant, &settings.greeting);
        greeting.suggested_questions = settings.suggested_questions.clone();

        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                messages: vec![greeting],
                ..State::default()
            }),
            message_updated: Signal::new(),
            response_finished: Signal::new(),
        });

        let chunk_inner = inner.clone();
        let chunk_guard = manager.on_message_scoped(move |chunk| chunk_inner.on_chunk(chunk));
        let error_inner = inner.clone();
        let error_guard = manager.on_error_scoped(move |error| error_inner.on_error(error));

        Self {
            manager,
            inner,
            _chunk_guard: chunk_guard,
            _error_guard: error_guard,
        }
    }

    /// Ask a question. Returns the id of the assistant message that will hold
    /// the answer.
    pub fn submit(&self, text: impl Into<String>) -> Result<MessageId, ConversationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        let assistant_id = {
            let mut state = self.inner.state.lock();
            if state.is_loading {
                return Err(ConversationError::ResponseInProgress);
            }

            state
                .messages
                .push(ChatMessage::new(MessageId::generate(), Role::User, text.as_str()));

            let assistant_id = MessageId::generate();
            let mut placeholder = ChatMessage::new(assistant_id.clone(), Role::Assistant, "");
            placeholder.is_loading = true;
            state.messages.push(placeholder);

            state.current = Some(assistant_id.clone());
            state.response.clear();
            state.is_loading = true;
            assistant_id
        };
        tracing::debug!(target: targets::CONVERSATION, id = %assistant_id, "question submitted");

        if let Err(error) = self.manager.send_message(text) {
            self.inner.on_error(&error);
            return Err(error.into());
        }
        Ok(assistant_id)
    }

    /// Clear the suggestions on `id` and submit `question`.
    pub fn submit_suggestion(
        &self,
        id: &MessageId,
        question: impl Into<String>,
    ) -> Result<MessageId, ConversationError> {
        self.remove_suggested_questions(id);
        self.submit(question)
    }

    /// Clear the suggested questions of a message. Returns `false` if there is
    /// no such message.
    pub fn remove_suggested_questions(&self, id: &MessageId) -> bool {
        let found = match self.inner.state.lock().message_mut(id) {
            Some(message) => {
                message.suggested_questions.clear();
                true
            }
            None => false,
        };
        if found {
            self.inner.message_updated.emit(id.clone());
        }
        found
    }

    /// Snapshot of all messages, oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.state.lock().messages.clone()
    }

    /// Snapshot of one message.
    pub fn message(&self, id: &MessageId) -> Option<ChatMessage> {
        self.inner
            .state
            .lock()
            .messages
            .iter()
            .find(|m| &m.id == id)
            .cloned()
    }

    /// Whether a response is streaming. No new question can be submitted
    /// until it finishes.
    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().is_loading
    }

    /// The most recent error, whether or not it interrupted a response.
    pub fn last_error(&self) -> Option<ErrorNotice> {
        self.inner.state.lock().last_error.clone()
    }

    pub fn message_updated(&self) -> &Signal<MessageId> {
        &self.inner.message_updated
    }

    pub fn response_finished(&self) -> &Signal<MessageId> {
        &self.inner.response_finished
    }

    /// The connection manager this conversation talks through.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Conversation")
            .field("messages", &state.messages.len())
            .field("is_loading", &state.is_loading)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_format() {
        let id = MessageId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "msg");
        assert!(parts[1].parse::<i64>().unwrap() > 0);
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2]
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
        assert_ne!(MessageId::generate(), id);
    }

    #[test]
    fn test_error_notice_for_initialization_fault() {
        let notice = ErrorNotice::for_error(&ChatError::backend("vector_store is empty"));
        assert!(notice.message.contains("initialize"));
        assert_eq!(notice.suggested_questions.len(), 3);
        assert_eq!(notice.suggested_questions[1], "Shall we check the server status?");
    }

    #[test]
    fn test_error_notice_generic() {
        for error in [
            ChatError::backend("rate limited"),
            ChatError::Send("broken pipe".into()),
            ChatError::ReconnectExhausted { attempts: 5 },
        ] {
            let notice = ErrorNotice::for_error(&error);
            assert!(notice.message.starts_with("Sorry"));
            assert_eq!(notice.suggested_questions[0], "Shall we try again?");
        }
    }

    #[test]
    fn test_chunk_accumulation_skips_repeated_suffix() {
        let id = MessageId::generate();
        let mut state = State {
            messages: vec![ChatMessage::new(id.clone(), Role::Assistant, "")],
            current: Some(id.clone()),
            is_loading: true,
            ..State::default()
        };

        assert_eq!(state.apply_chunk("Hello"), Some(id.clone()));
        state.apply_chunk("Hello");
        state.apply_chunk(", world");
        state.apply_chunk("d");
        assert_eq!(state.response, "Hello, world");
        assert_eq!(state.messages[0].content, "Hello, world");
    }

    #[test]
    fn test_chunk_without_response_is_ignored() {
        let mut state = State::default();
        assert_eq!(state.apply_chunk("stray"), None);
        assert!(state.response.is_empty());
    }

    #[test]
    fn test_error_outside_response_only_recorded() {
        let mut state = State {
            messages: vec![ChatMessage::new(MessageId::initial(), Role::Assistant, "hi")],
            current: Some(MessageId::initial()),
            ..State::default()
        };
        let notice = ErrorNotice::for_error(&ChatError::Transport("reset".into()));
        assert_eq!(state.apply_error(notice.clone()), None);
        assert_eq!(state.messages[0].content, "hi");
        assert_eq!(state.last_error, Some(notice));
    }
}
