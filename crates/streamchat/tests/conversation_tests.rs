//! Conversation behavior over an in-memory transport.

use std::sync::Arc;

use parking_lot::Mutex;
use streamchat::{
    ChatConfig, ChatError, ConnectionConfig, ConnectionManager, Conversation, ConversationError,
    ConversationSettings, MemoryConnector, MemoryLink, MessageId, Role,
};

struct Harness {
    connector: MemoryConnector,
    conversation: Conversation,
}

impl Harness {
    async fn new() -> Self {
        let connector = MemoryConnector::auto_open();
        let manager = Arc::new(ConnectionManager::with_connector(
            ConnectionConfig::default(),
            Arc::new(connector.clone()),
        ));
        let conversation = Conversation::new(manager, &ConversationSettings::default());
        let harness = Self {
            connector,
            conversation,
        };
        harness.settle().await;
        harness
    }

    fn link(&self) -> MemoryLink {
        self.connector.last_link().unwrap()
    }

    /// Wait until every delivered frame has reached the conversation.
    async fn settle(&self) {
        self.conversation.manager().status().await.unwrap();
    }

    async fn stream(&self, frames: &[&str]) {
        let link = self.link();
        for frame in frames {
            link.push_text(*frame);
        }
        self.settle().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_starts_with_greeting() {
    let harness = Harness::new().await;
    let messages = harness.conversation.messages();

    assert_eq!(messages.len(), 1);
    let greeting = &messages[0];
    assert_eq!(greeting.id, MessageId::initial());
    assert_eq!(greeting.role, Role::Assistant);
    assert_eq!(greeting.content, ConversationSettings::default().greeting);
    assert_eq!(greeting.suggested_questions.len(), 3);
    assert!(!harness.conversation.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_submit_sends_query_and_opens_placeholder() {
    let harness = Harness::new().await;
    let id = harness.conversation.submit("What is streamchat?").unwrap();
    harness.settle().await;

    assert_eq!(harness.link().sent_queries(), vec!["What is streamchat?"]);
    assert!(harness.conversation.is_loading());

    let messages = harness.conversation.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "What is streamchat?");
    assert_eq!(messages[2].id, id);
    assert_eq!(messages[2].role, Role::Assistant);
    assert!(messages[2].is_loading);
    assert!(messages[2].content.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_streamed_response_accumulates_until_end_of_stream() {
    let harness = Harness::new().await;
    let updates = Arc::new(Mutex::new(0usize));
    let counter = updates.clone();
    harness
        .conversation
        .message_updated()
        .connect(move |_| *counter.lock() += 1);
    let finished = Arc::new(Mutex::new(Vec::new()));
    let sink = finished.clone();
    harness
        .conversation
        .response_finished()
        .connect(move |id| sink.lock().push(id.clone()));

    let id = harness.conversation.submit("greet me").unwrap();
    harness
        .stream(&[r#"{"content":"Hel"}"#, r#"{"content":"lo"}"#])
        .await;

    let message = harness.conversation.message(&id).unwrap();
    assert_eq!(message.content, "Hello");
    assert!(!message.is_loading);
    assert!(harness.conversation.is_loading());
    assert!(finished.lock().is_empty());

    harness.stream(&[r#"{"content":"[EOS]"}"#]).await;
    assert!(!harness.conversation.is_loading());
    assert_eq!(*finished.lock(), vec![id.clone()]);
    assert_eq!(*updates.lock(), 2);
    assert_eq!(harness.conversation.message(&id).unwrap().content, "Hello");
}

#[tokio::test(start_paused = true)]
async fn test_repeated_chunk_is_not_duplicated() {
    let harness = Harness::new().await;
    let id = harness.conversation.submit("echo").unwrap();
    harness
        .stream(&[
            r#"{"content":"The answer"}"#,
            r#"{"content":"The answer"}"#,
            r#"{"content":" is 42"}"#,
            r#"{"content":"[EOS]"}"#,
        ])
        .await;

    assert_eq!(
        harness.conversation.message(&id).unwrap().content,
        "The answer is 42"
    );
}

#[tokio::test(start_paused = true)]
async fn test_submit_rejected_while_streaming() {
    let harness = Harness::new().await;
    harness.conversation.submit("first").unwrap();

    assert_eq!(
        harness.conversation.submit("second"),
        Err(ConversationError::ResponseInProgress)
    );
    assert_eq!(
        harness.conversation.submit("   "),
        Err(ConversationError::EmptyMessage)
    );

    harness.stream(&["done", "[EOS]"]).await;
    assert!(harness.conversation.submit("second").is_ok());
    harness.settle().await;
    assert_eq!(harness.link().sent_queries(), vec!["first", "second"]);
}

#[tokio::test(start_paused = true)]
async fn test_initialization_fault_replaces_response() {
    let harness = Harness::new().await;
    let id = harness.conversation.submit("search the index").unwrap();
    harness
        .stream(&[r#"{"error":"FAISS index 0 is out of bounds"}"#])
        .await;

    let message = harness.conversation.message(&id).unwrap();
    assert!(message.content.contains("failed to initialize"));
    assert_eq!(
        message.suggested_questions,
        vec![
            "Shall we try again in a moment?",
            "Shall we check the server status?",
            "Shall we try a different question?",
        ]
    );
    assert!(!harness.conversation.is_loading());
    assert!(harness.conversation.last_error().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_error_after_response_keeps_answer() {
    let harness = Harness::new().await;
    let id = harness.conversation.submit("hi").unwrap();
    harness.stream(&["Hi there", "[EOS]"]).await;

    harness
        .link()
        .fail(ChatError::Transport("connection reset".into()));
    harness.settle().await;

    assert_eq!(harness.conversation.message(&id).unwrap().content, "Hi there");
    let notice = harness.conversation.last_error().unwrap();
    assert!(notice.message.starts_with("Sorry"));
}

#[tokio::test(start_paused = true)]
async fn test_suggestions_can_be_removed_and_submitted() {
    let harness = Harness::new().await;
    let initial = MessageId::initial();

    let question = harness.conversation.messages()[0].suggested_questions[0].clone();
    harness
        .conversation
        .submit_suggestion(&initial, question.clone())
        .unwrap();
    harness.settle().await;

    assert!(harness
        .conversation
        .message(&initial)
        .unwrap()
        .suggested_questions
        .is_empty());
    assert_eq!(harness.link().sent_queries(), vec![question]);
    assert!(!harness
        .conversation
        .remove_suggested_questions(&MessageId::generate()));
}

#[tokio::test(start_paused = true)]
async fn test_custom_greeting_from_config() {
    let config = ChatConfig::from_toml_str(
        r#"
        [conversation]
        greeting = "Welcome to the help desk."
        suggested_questions = ["Opening hours?"]
        "#,
    )
    .unwrap();
    let connector = MemoryConnector::auto_open();
    let manager = Arc::new(ConnectionManager::with_connector(
        config.connection_config().unwrap(),
        Arc::new(connector),
    ));
    let conversation = Conversation::new(manager, &config.conversation);

    let messages = conversation.messages();
    let greeting = &messages[0];
    assert_eq!(greeting.content, "Welcome to the help desk.");
    assert_eq!(greeting.suggested_questions, vec!["Opening hours?"]);
}

#[tokio::test(start_paused = true)]
async fn test_messages_serialize_to_json() {
    let harness = Harness::new().await;
    let value = serde_json::to_value(harness.conversation.messages()).unwrap();

    assert_eq!(value[0]["id"], "initial");
    assert_eq!(value[0]["role"], "assistant");
    assert!(value[0]["timestamp"].is_string());
}
