//! Store selection and construction.

use std::path::PathBuf;
use std::sync::Arc;

use pchat::{ConversationStore, InMemoryConversationStore};

use crate::backends::filesystem::FilesystemConversationStore;
use crate::backends::sqlite::{SqliteConversationStore, default_sqlite_path};
use crate::error::MemoryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    Sqlite { path: PathBuf },
    Filesystem { root: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

impl StoreConfig {
    /// Parses `memory`, `sqlite:<path>`, or `fs:<dir>`.
    ///
    /// ```rust
    /// use std::path::PathBuf;
    /// use pmemory::StoreConfig;
    ///
    /// assert_eq!(StoreConfig::parse("memory").unwrap(), StoreConfig::Memory);
    /// assert_eq!(
    ///     StoreConfig::parse("fs:/tmp/chats").unwrap(),
    ///     StoreConfig::Filesystem { root: PathBuf::from("/tmp/chats") }
    /// );
    /// ```
    pub fn parse(value: &str) -> Result<Self, MemoryError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("memory") {
            return Ok(Self::Memory);
        }

        if let Some(path) = value.strip_prefix("sqlite:") {
            return non_empty(path, "sqlite").map(|path| Self::Sqlite { path });
        }

        if let Some(root) = value.strip_prefix("fs:") {
            return non_empty(root, "fs").map(|root| Self::Filesystem { root });
        }

        Err(MemoryError::invalid_request(format!(
            "unknown store '{value}'; expected 'memory', 'sqlite:<path>', or 'fs:<dir>'"
        )))
    }
}

fn non_empty(value: &str, scheme: &str) -> Result<PathBuf, MemoryError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MemoryError::invalid_request(format!(
            "store '{scheme}:' requires a path"
        )));
    }
    Ok(PathBuf::from(value))
}

pub fn create_conversation_store(
    config: StoreConfig,
) -> Result<Arc<dyn ConversationStore>, MemoryError> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(InMemoryConversationStore::new())),
        StoreConfig::Sqlite { path } => Ok(Arc::new(SqliteConversationStore::new(path)?)),
        StoreConfig::Filesystem { root } => {
            Ok(Arc::new(FilesystemConversationStore::new(root)?))
        }
    }
}

pub fn create_default_conversation_store() -> Result<Arc<dyn ConversationStore>, MemoryError> {
    create_conversation_store(StoreConfig::default())
}
