//! Common `pprovider` imports for downstream crates.

pub use crate::{
    BoxedEventStream, CredentialId, CredentialLease, CredentialPool, Message, ModelEventStream,
    ModelProvider, ModelRequest, ModelResponse, NoopOperationHooks, ProviderError,
    ProviderErrorKind, ProviderOperationHooks, QuotaPolicy, Role, StreamEvent, WindowSweeper,
    execute_with_failover,
};
pub use crate::adapters::openai::{OpenAiHttpTransport, OpenAiProvider, OpenAiTransport};
pub use pcommon::{BoxFuture, GenerationOptions};
