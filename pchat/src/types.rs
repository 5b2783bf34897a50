//! Conversation, message, and turn types.
//!
//! ```rust
//! use pchat::{Conversation, ConversationMessage, MessageRole};
//! use pcommon::ConversationId;
//!
//! let mut conversation = Conversation::new(ConversationId::from("conv-1"));
//! assert_eq!(conversation.title, Conversation::PLACEHOLDER_TITLE);
//!
//! conversation.push(ConversationMessage::user("How do I reverse a linked list in place?"));
//! assert_eq!(conversation.title, "How do I reverse a l...");
//! assert_eq!(MessageRole::parse("tool"), MessageRole::Assistant);
//! ```

use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use pcommon::{ConversationId, GenerationOptions, SessionId};
use pprovider::{Message, Role};

const TITLE_MAX_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Reads a persisted role. Anything other than `"user"` is an assistant turn.
    pub fn parse(value: &str) -> Self {
        if value == "user" {
            Self::User
        } else {
            Self::Assistant
        }
    }
}

impl From<MessageRole> for Role {
    fn from(value: MessageRole) -> Self {
        match value {
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn to_provider_message(&self) -> Message {
        Message::new(self.role.into(), self.content.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    pub messages: Vec<ConversationMessage>,
    pub created_at: SystemTime,
}

impl Conversation {
    pub const PLACEHOLDER_TITLE: &'static str = "New conversation";

    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            title: Self::PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            created_at: SystemTime::now(),
        }
    }

    pub fn with_created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = created_at;
        self
    }

    /// Appends in order. The first user message also names the conversation.
    pub fn push(&mut self, message: ConversationMessage) {
        if message.role == MessageRole::User && !self.has_user_message() {
            self.title = title_from(&message.content);
        }

        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = ConversationMessage>) {
        for message in messages {
            self.push(message);
        }
    }

    fn has_user_message(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.role == MessageRole::User)
    }
}

/// First 20 characters of `text`, with `...` appended when anything was cut.
pub fn title_from(text: &str) -> String {
    let mut chars = text.chars();
    let mut title = chars.by_ref().take(TITLE_MAX_CHARS).collect::<String>();
    if chars.next().is_some() {
        title.push_str("...");
    }
    title
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    /// `None` starts a new conversation.
    pub conversation_id: Option<ConversationId>,
    pub user_text: String,
    pub options: GenerationOptions,
}

impl TurnRequest {
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            conversation_id: None,
            user_text: user_text.into(),
            options: GenerationOptions::default(),
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options = self.options.with_temperature(temperature);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnResult {
    pub conversation_id: ConversationId,
    pub session_id: SessionId,
    /// Final committed assistant content, after any normalization.
    pub content: String,
    pub normalized: bool,
}

impl From<TurnResult> for String {
    fn from(value: TurnResult) -> Self {
        value.content
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    KeySelected,
    Requesting,
    Streaming,
    Finalizing,
    Committed,
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::KeySelected => "key_selected",
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
