//! Conversational turns over streaming chat-completions providers.
//!
//! A turn builds a bounded context from the stored conversation, streams the
//! reply through a pooled credential while rendering increments, optionally
//! normalizes the reply language, and commits user and assistant messages
//! together only when the whole turn succeeds.

mod context;
mod error;
mod hooks;
mod postprocess;
mod service;
mod sink;
mod store;
mod types;

pub mod prelude {
    pub use crate::{
        ChannelSink, ChatError, ChatErrorKind, ChatPolicy, ChatService, ChatServiceBuilder,
        ChatSessionHooks, Conversation, ConversationMessage, ConversationStore, FragmentSink,
        InMemoryConversationStore, MessageRole, NoopChatHooks, NoopSink, SessionEnd,
        SessionState, SinkEvent, TurnOutcome, TurnRequest, TurnResult,
    };
    pub use pcommon::{ConversationId, GenerationOptions, SessionId};
}

pub use context::{
    DEFAULT_CONTEXT_TURNS, DEFAULT_SYSTEM_INSTRUCTION, build_turn_messages, context_window,
};
pub use error::{ChatError, ChatErrorKind, TurnOutcome};
pub use hooks::{ChatSessionHooks, NoopChatHooks};
pub use postprocess::{
    NORMALIZATION_INSTRUCTION, NORMALIZATION_TEMPERATURE, Normalizer, needs_normalization,
    translation_prompt,
};
pub use service::{
    ChatPolicy, ChatService, ChatServiceBuilder, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
};
pub use sink::{ChannelSink, FragmentSink, NoopSink, SessionEnd, SinkEvent};
pub use store::{ChatFuture, ConversationStore, InMemoryConversationStore};
pub use types::{
    Conversation, ConversationMessage, MessageRole, SessionState, TurnRequest, TurnResult,
    title_from,
};
pub use pcommon::{ConversationId, GenerationOptions, SessionId};
