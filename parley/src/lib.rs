//! Unified facade over the parley workspace crates.
//!
//! Most applications depend on this crate alone: it re-exports the building
//! blocks and assembles a ready-to-use runtime from [`RuntimeConfig`].
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn run() -> Result<(), RuntimeError> {
//! let runtime = build_runtime(RuntimeConfig::from_env()?)?;
//! let (sink, _updates) = ChannelSink::new(64);
//! let result = runtime.chat.send_turn(turn("Explain recursion"), &sink).await?;
//! println!("{}", result.content);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod providers;

pub mod prelude;
pub mod runtime;
pub mod util;

pub use pchat;
pub use pcommon;
pub use pmemory;
pub use pobserve;
pub use pprovider;

pub use config::{
    ENV_API_KEYS, ENV_BASE_URL, ENV_MODEL, ENV_STORE, ENV_TIMEOUT_SECS, RuntimeConfig,
};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use pchat::{
    ChannelSink, ChatError, ChatErrorKind, ChatPolicy, ChatService, ChatServiceBuilder,
    ChatSessionHooks, Conversation, ConversationMessage, ConversationStore, FragmentSink,
    InMemoryConversationStore, MessageRole, NoopChatHooks, NoopSink, SessionEnd, SessionState,
    SinkEvent, TurnOutcome, TurnRequest, TurnResult,
};
pub use pcommon::{BoxFuture, ConversationId, GenerationOptions, SessionId};
pub use pmemory::{
    FilesystemConversationStore, MemoryError, MemoryErrorKind, SqliteConversationStore,
    StoreConfig, create_conversation_store,
};
pub use pobserve::{
    MetricsObservabilityHooks, SafeChatHooks, SafeProviderHooks, TracingObservabilityHooks,
};
pub use pprovider::{
    CredentialPool, Message, ModelProvider, ModelRequest, ModelResponse, NoopOperationHooks,
    ProviderError, ProviderErrorKind, ProviderOperationHooks, QuotaPolicy, Role, StreamEvent,
    WindowSweeper,
};
pub use providers::{ProviderBuildConfig, build_credential_pool, build_provider};
pub use runtime::{RuntimeBundle, build_runtime, build_runtime_with, chat_service};
pub use util::{assistant_message, follow_up, outcome, system_message, turn, user_message};
