//! Conversation storage contracts and a basic in-memory implementation.

use std::sync::{Mutex, MutexGuard};

use pcommon::{BoxFuture, ConversationId};

use crate::{ChatError, Conversation, ConversationMessage};

pub type ChatFuture<'a, T> = BoxFuture<'a, T>;

/// Durable mapping from conversation id to an ordered message list.
///
/// Messages are append-only. `append_messages` must apply the whole batch or
/// nothing, and must fail with `ConversationNotFound` for an unknown id.
pub trait ConversationStore: Send + Sync {
    fn create<'a>(&'a self) -> ChatFuture<'a, Result<Conversation, ChatError>>;

    fn get<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<Option<Conversation>, ChatError>>;

    /// Most recently created first.
    fn list<'a>(&'a self) -> ChatFuture<'a, Result<Vec<Conversation>, ChatError>>;

    fn append_messages<'a>(
        &'a self,
        id: &'a ConversationId,
        messages: Vec<ConversationMessage>,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    fn append<'a>(
        &'a self,
        id: &'a ConversationId,
        message: ConversationMessage,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        self.append_messages(id, vec![message])
    }

    /// Returns whether a conversation was removed.
    fn delete<'a>(&'a self, id: &'a ConversationId) -> ChatFuture<'a, Result<bool, ChatError>>;
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<Vec<Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Conversation>>, ChatError> {
        self.conversations
            .lock()
            .map_err(|_| ChatError::store("conversation store lock poisoned"))
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn create<'a>(&'a self) -> ChatFuture<'a, Result<Conversation, ChatError>> {
        Box::pin(async move {
            let conversation = Conversation::new(ConversationId::generate());
            self.lock()?.push(conversation.clone());
            Ok(conversation)
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<Option<Conversation>, ChatError>> {
        Box::pin(async move {
            Ok(self
                .lock()?
                .iter()
                .find(|conversation| &conversation.id == id)
                .cloned())
        })
    }

    fn list<'a>(&'a self) -> ChatFuture<'a, Result<Vec<Conversation>, ChatError>> {
        Box::pin(async move { Ok(self.lock()?.iter().rev().cloned().collect()) })
    }

    fn append_messages<'a>(
        &'a self,
        id: &'a ConversationId,
        messages: Vec<ConversationMessage>,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let mut conversations = self.lock()?;
            let conversation = conversations
                .iter_mut()
                .find(|conversation| &conversation.id == id)
                .ok_or_else(|| {
                    ChatError::conversation_not_found(format!("conversation '{id}' not found"))
                })?;

            conversation.extend(messages);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, id: &'a ConversationId) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let mut conversations = self.lock()?;
            let before = conversations.len();
            conversations.retain(|conversation| &conversation.id != id);
            Ok(conversations.len() != before)
        })
    }
}
