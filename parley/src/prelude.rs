//! Common imports for most parley applications.

pub use crate::{
    ChatError, ChatErrorKind, ChatPolicy, ChatService, ChannelSink, ConversationId,
    ConversationStore, CredentialPool, FragmentSink, NoopSink, ProviderBuildConfig, QuotaPolicy,
    RuntimeBundle, RuntimeConfig, RuntimeError, RuntimeErrorKind, SessionEnd, SessionId,
    SinkEvent, StoreConfig, TurnOutcome, TurnRequest, TurnResult,
};
pub use crate::{
    assistant_message, build_credential_pool, build_provider, build_runtime,
    build_runtime_with, chat_service, follow_up, outcome, system_message, turn, user_message,
};
