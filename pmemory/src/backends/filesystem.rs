use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use pchat::{
    ChatError, ChatFuture, Conversation, ConversationMessage, ConversationStore, MessageRole,
};
use pcommon::ConversationId;
use serde::{Deserialize, Serialize};

use crate::backends::{decode_system_time, encode_system_time};
use crate::error::MemoryError;

/// One pretty-printed JSON document per conversation under `<root>/conversations`.
#[derive(Debug)]
pub struct FilesystemConversationStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl FilesystemConversationStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("conversations")).map_err(|error| {
            MemoryError::storage(format!("failed to create conversation directory: {error}"))
        })?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, MemoryError> {
        self.lock
            .lock()
            .map_err(|_| MemoryError::storage("filesystem store lock poisoned"))
    }

    fn conversations_dir(&self) -> PathBuf {
        self.root.join("conversations")
    }

    fn conversation_path(&self, id: &ConversationId) -> PathBuf {
        self.conversations_dir()
            .join(format!("{}.json", hex_encode(id.as_str().as_bytes())))
    }

    fn load(&self, id: &ConversationId) -> Result<Option<Conversation>, MemoryError> {
        let path = self.conversation_path(id);
        if !path.exists() {
            return Ok(None);
        }
        read_conversation(&path).map(Some)
    }

    fn save(&self, conversation: &Conversation) -> Result<(), MemoryError> {
        let persisted = PersistedConversation::from_conversation(conversation)?;
        let bytes = serde_json::to_vec_pretty(&persisted).map_err(|error| {
            MemoryError::storage(format!("failed to serialize conversation: {error}"))
        })?;
        write_atomic(&self.conversation_path(&conversation.id), &bytes)
    }

    fn load_all(&self) -> Result<Vec<Conversation>, MemoryError> {
        let entries = fs::read_dir(self.conversations_dir()).map_err(|error| {
            MemoryError::storage(format!("failed to read conversation directory: {error}"))
        })?;

        let mut conversations = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|error| {
                    MemoryError::storage(format!("failed to read directory entry: {error}"))
                })?
                .path();
            if path.extension().and_then(|extension| extension.to_str()) == Some("json") {
                conversations.push(read_conversation(&path)?);
            }
        }

        conversations.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.as_str().cmp(left.id.as_str()))
        });
        Ok(conversations)
    }
}

impl ConversationStore for FilesystemConversationStore {
    fn create<'a>(&'a self) -> ChatFuture<'a, Result<Conversation, ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            let conversation = Conversation::new(ConversationId::generate());
            self.save(&conversation)?;
            Ok(conversation)
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<Option<Conversation>, ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            Ok(self.load(id)?)
        })
    }

    fn list<'a>(&'a self) -> ChatFuture<'a, Result<Vec<Conversation>, ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            Ok(self.load_all()?)
        })
    }

    fn append_messages<'a>(
        &'a self,
        id: &'a ConversationId,
        messages: Vec<ConversationMessage>,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            let mut conversation = self.load(id)?.ok_or_else(|| {
                MemoryError::not_found(format!("conversation '{id}' not found"))
            })?;
            conversation.extend(messages);
            Ok(self.save(&conversation)?)
        })
    }

    fn delete<'a>(&'a self, id: &'a ConversationId) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let _guard = self.guard()?;
            let path = self.conversation_path(id);
            if !path.exists() {
                return Ok(false);
            }
            fs::remove_file(&path).map_err(|error| {
                MemoryError::storage(format!("failed to delete conversation file: {error}"))
            })?;
            Ok(true)
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedConversation {
    id: String,
    title: String,
    created_at_secs: i64,
    created_at_nanos: i64,
    #[serde(default)]
    messages: Vec<PersistedMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedMessage {
    role: String,
    content: String,
}

impl PersistedConversation {
    fn from_conversation(conversation: &Conversation) -> Result<Self, MemoryError> {
        let (created_at_secs, created_at_nanos) = encode_system_time(conversation.created_at)?;
        Ok(Self {
            id: conversation.id.as_str().to_string(),
            title: conversation.title.clone(),
            created_at_secs,
            created_at_nanos,
            messages: conversation
                .messages
                .iter()
                .map(|message| PersistedMessage {
                    role: message.role.as_str().to_string(),
                    content: message.content.clone(),
                })
                .collect(),
        })
    }

    fn into_conversation(self) -> Result<Conversation, MemoryError> {
        let created_at = decode_system_time(self.created_at_secs, self.created_at_nanos)?;
        let mut conversation =
            Conversation::new(ConversationId::new(self.id)).with_created_at(created_at);
        conversation.title = self.title;
        conversation.messages = self
            .messages
            .into_iter()
            .map(|message| {
                ConversationMessage::new(MessageRole::parse(&message.role), message.content)
            })
            .collect();
        Ok(conversation)
    }
}

fn read_conversation(path: &Path) -> Result<Conversation, MemoryError> {
    let bytes = fs::read(path).map_err(|error| {
        MemoryError::storage(format!("failed to read conversation file: {error}"))
    })?;
    serde_json::from_slice::<PersistedConversation>(&bytes)
        .map_err(|error| {
            MemoryError::corrupt(format!(
                "failed to deserialize conversation '{}': {error}",
                path.display()
            ))
        })?
        .into_conversation()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MemoryError> {
    let Some(parent) = path.parent() else {
        return Err(MemoryError::storage(
            "conversation file missing parent directory",
        ));
    };
    fs::create_dir_all(parent).map_err(|error| {
        MemoryError::storage(format!("failed to create parent directory: {error}"))
    })?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|error| {
        MemoryError::storage(format!("failed to write temporary conversation file: {error}"))
    })?;
    fs::rename(&tmp, path).map_err(|error| {
        MemoryError::storage(format!("failed to finalize conversation file: {error}"))
    })
}

fn hex_encode(input: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(input.len() * 2);
    for byte in input {
        output.push(char::from(DIGITS[usize::from(byte >> 4)]));
        output.push(char::from(DIGITS[usize::from(byte & 0x0f)]));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::hex_encode;

    #[test]
    fn file_names_are_hex_of_the_id() {
        assert_eq!(hex_encode(b"conv/1"), "636f6e762f31");
    }
}
