use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use pchat::{
    ChatError, ChatFuture, Conversation, ConversationMessage, ConversationStore, MessageRole,
};
use pcommon::ConversationId;
use rusqlite::{Connection, OptionalExtension, params};

use crate::backends::{decode_system_time, encode_system_time};
use crate::error::MemoryError;

#[derive(Debug)]
pub struct SqliteConversationStore {
    connection: Mutex<Connection>,
}

impl SqliteConversationStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                MemoryError::storage(format!(
                    "failed to create sqlite parent directory: {error}"
                ))
            })?;
        }

        let connection = Connection::open(path).map_err(|error| {
            MemoryError::storage(format!("failed to open sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    pub fn new_in_memory() -> Result<Self, MemoryError> {
        let connection = Connection::open_in_memory().map_err(|error| {
            MemoryError::storage(format!("failed to open in-memory sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, MemoryError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                MemoryError::storage(format!("failed to configure sqlite busy timeout: {error}"))
            })?;
        let store = Self {
            connection: Mutex::new(connection),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, MemoryError> {
        self.connection
            .lock()
            .map_err(|_| MemoryError::storage("sqlite store lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<(), MemoryError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS conversations (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversation_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation_id
            ON conversation_messages(conversation_id, id);
            ",
        )
        .map_err(|error| {
            MemoryError::storage(format!("failed to initialize sqlite schema: {error}"))
        })?;

        Ok(())
    }

    fn insert_conversation(
        conn: &Connection,
        conversation: &Conversation,
    ) -> Result<(), MemoryError> {
        let (secs, nanos) = encode_system_time(conversation.created_at)?;
        conn.execute(
            "
            INSERT INTO conversations (conversation_id, title, created_at_secs, created_at_nanos)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![conversation.id.as_str(), &conversation.title, secs, nanos],
        )
        .map_err(|error| MemoryError::storage(format!("failed to insert conversation: {error}")))?;
        Ok(())
    }

    fn load_conversation(
        conn: &Connection,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, MemoryError> {
        let header = conn
            .query_row(
                "
                SELECT title, created_at_secs, created_at_nanos
                FROM conversations
                WHERE conversation_id = ?1
                ",
                params![id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|error| MemoryError::storage(format!("failed to load conversation: {error}")))?;

        let Some((title, secs, nanos)) = header else {
            return Ok(None);
        };

        let mut conversation = Conversation::new(id.clone())
            .with_created_at(decode_system_time(secs, nanos)?);
        conversation.title = title;
        conversation.messages = Self::load_messages(conn, id)?;
        Ok(Some(conversation))
    }

    fn load_messages(
        conn: &Connection,
        id: &ConversationId,
    ) -> Result<Vec<ConversationMessage>, MemoryError> {
        let mut statement = conn
            .prepare(
                "
                SELECT role, content
                FROM conversation_messages
                WHERE conversation_id = ?1
                ORDER BY id ASC
                ",
            )
            .map_err(|error| {
                MemoryError::storage(format!("failed to prepare message query: {error}"))
            })?;
        let rows = statement
            .query_map(params![id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|error| MemoryError::storage(format!("failed to query messages: {error}")))?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content) = row.map_err(|error| {
                MemoryError::storage(format!("failed to decode message row: {error}"))
            })?;
            messages.push(ConversationMessage::new(MessageRole::parse(&role), content));
        }
        Ok(messages)
    }

    fn list_ids(conn: &Connection) -> Result<Vec<ConversationId>, MemoryError> {
        let mut statement = conn
            .prepare(
                "
                SELECT conversation_id
                FROM conversations
                ORDER BY created_at_secs DESC, created_at_nanos DESC, seq DESC
                ",
            )
            .map_err(|error| {
                MemoryError::storage(format!("failed to prepare conversation listing: {error}"))
            })?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|error| {
                MemoryError::storage(format!("failed to list conversations: {error}"))
            })?;

        let mut ids = Vec::new();
        for row in rows {
            let id = row.map_err(|error| {
                MemoryError::storage(format!("failed to decode conversation row: {error}"))
            })?;
            ids.push(ConversationId::new(id));
        }
        Ok(ids)
    }
}

impl ConversationStore for SqliteConversationStore {
    fn create<'a>(&'a self) -> ChatFuture<'a, Result<Conversation, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let conversation = Conversation::new(ConversationId::generate());
            Self::insert_conversation(&conn, &conversation)?;
            Ok(conversation)
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a ConversationId,
    ) -> ChatFuture<'a, Result<Option<Conversation>, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            Ok(Self::load_conversation(&conn, id)?)
        })
    }

    fn list<'a>(&'a self) -> ChatFuture<'a, Result<Vec<Conversation>, ChatError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let mut conversations = Vec::new();
            for id in Self::list_ids(&conn)? {
                if let Some(conversation) = Self::load_conversation(&conn, &id)? {
                    conversations.push(conversation);
                }
            }
            Ok(conversations)
        })
    }

    fn append_messages<'a>(
        &'a self,
        id: &'a ConversationId,
        messages: Vec<ConversationMessage>,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            let mut conn = self.connection()?;
            let tx = conn.transaction().map_err(|error| {
                MemoryError::storage(format!("failed to begin append transaction: {error}"))
            })?;

            let mut conversation = Self::load_conversation(&tx, id)?.ok_or_else(|| {
                MemoryError::not_found(format!("conversation '{id}' not found"))
            })?;
            conversation.extend(messages.iter().cloned());

            tx.execute(
                "UPDATE conversations SET title = ?2 WHERE conversation_id = ?1",
                params![id.as_str(), &conversation.title],
            )
            .map_err(|error| MemoryError::storage(format!("failed to update title: {error}")))?;

            for message in &messages {
                tx.execute(
                    "
                    INSERT INTO conversation_messages (conversation_id, role, content)
                    VALUES (?1, ?2, ?3)
                    ",
                    params![id.as_str(), message.role.as_str(), &message.content],
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to append message: {error}"))
                })?;
            }

            tx.commit().map_err(|error| {
                MemoryError::storage(format!("failed to commit append transaction: {error}"))
            })?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, id: &'a ConversationId) -> ChatFuture<'a, Result<bool, ChatError>> {
        Box::pin(async move {
            let mut conn = self.connection()?;
            let tx = conn.transaction().map_err(|error| {
                MemoryError::storage(format!("failed to begin delete transaction: {error}"))
            })?;
            tx.execute(
                "DELETE FROM conversation_messages WHERE conversation_id = ?1",
                params![id.as_str()],
            )
            .map_err(|error| MemoryError::storage(format!("failed to delete messages: {error}")))?;
            let removed = tx
                .execute(
                    "DELETE FROM conversations WHERE conversation_id = ?1",
                    params![id.as_str()],
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to delete conversation: {error}"))
                })?;
            tx.commit().map_err(|error| {
                MemoryError::storage(format!("failed to commit delete transaction: {error}"))
            })?;
            Ok(removed > 0)
        })
    }
}

/// `$PARLEY_SQLITE_PATH`, else `~/.parley/conversations.sqlite3`.
pub(crate) fn default_sqlite_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os("PARLEY_SQLITE_PATH") {
        return PathBuf::from(explicit);
    }

    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home)
            .join(".parley")
            .join("conversations.sqlite3");
    }

    PathBuf::from("conversations.sqlite3")
}
