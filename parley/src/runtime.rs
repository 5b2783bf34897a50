//! Runtime wiring: credential pool, provider, store, hooks, and the quota sweeper.

use std::sync::Arc;

use pchat::{ChatService, ConversationStore};
use pmemory::create_conversation_store;
use pobserve::{SafeChatHooks, SafeProviderHooks, TracingObservabilityHooks};
use pprovider::{CredentialPool, ModelProvider, ProviderOperationHooks, WindowSweeper};

use crate::providers::{build_credential_pool, build_provider};
use crate::{RuntimeConfig, RuntimeError};

/// Everything a presentation layer needs to run turns.
///
/// Dropping the bundle stops the quota sweeper.
pub struct RuntimeBundle {
    pub pool: Arc<CredentialPool>,
    pub store: Arc<dyn ConversationStore>,
    pub chat: ChatService,
    sweeper: WindowSweeper,
}

impl RuntimeBundle {
    pub fn shutdown(self) {
        self.sweeper.stop();
    }
}

/// Builds the HTTP provider and the configured store, then wires them up.
///
/// Must be called from within a tokio runtime.
pub fn build_runtime(config: RuntimeConfig) -> Result<RuntimeBundle, RuntimeError> {
    config.validate()?;

    let provider = build_provider(config.provider_config())?;
    let store = create_conversation_store(config.store.clone())?;
    build_runtime_with(config, provider, store)
}

/// Like [`build_runtime`], with a caller-supplied provider and store.
pub fn build_runtime_with(
    config: RuntimeConfig,
    provider: Arc<dyn ModelProvider>,
    store: Arc<dyn ConversationStore>,
) -> Result<RuntimeBundle, RuntimeError> {
    config.validate()?;
    tokio::runtime::Handle::try_current().map_err(|_| {
        RuntimeError::no_runtime("the quota sweeper needs a running tokio runtime")
    })?;

    let pool = build_credential_pool(config.api_keys.iter().cloned(), config.quota)?;
    let provider_hooks: Arc<dyn ProviderOperationHooks> =
        Arc::new(SafeProviderHooks::new(TracingObservabilityHooks));

    let chat = ChatService::builder(provider, Arc::clone(&pool))
        .store(Arc::clone(&store))
        .provider_hooks(Arc::clone(&provider_hooks))
        .session_hooks(Arc::new(SafeChatHooks::new(TracingObservabilityHooks)))
        .policy(config.chat_policy())
        .build()?;

    let sweeper = WindowSweeper::spawn(Arc::clone(&pool), config.sweep_interval, provider_hooks);

    Ok(RuntimeBundle {
        pool,
        store,
        chat,
        sweeper,
    })
}

/// A chat service over an in-memory store with no-op hooks.
pub fn chat_service(
    provider: Arc<dyn ModelProvider>,
    pool: Arc<CredentialPool>,
) -> Result<ChatService, RuntimeError> {
    Ok(ChatService::builder(provider, pool).build()?)
}
