//! Durable `ConversationStore` implementations: SQLite and JSON files.

mod backends;
mod config;
mod error;

pub mod prelude {
    pub use crate::{
        FilesystemConversationStore, MemoryError, MemoryErrorKind, SqliteConversationStore,
        StoreConfig, create_conversation_store, create_default_conversation_store,
    };
}

pub use backends::filesystem::FilesystemConversationStore;
pub use backends::sqlite::SqliteConversationStore;
pub use config::{StoreConfig, create_conversation_store, create_default_conversation_store};
pub use error::{MemoryError, MemoryErrorKind};

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use pchat::{
        ChatErrorKind, Conversation, ConversationMessage, ConversationStore,
        InMemoryConversationStore, MessageRole,
    };
    use pcommon::ConversationId;

    use crate::{
        FilesystemConversationStore, MemoryErrorKind, SqliteConversationStore, StoreConfig,
        create_conversation_store,
    };

    fn temp_dir(prefix: &str) -> PathBuf {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("pmemory-{prefix}-{unique}"))
    }

    async fn exercise_store_contract(store: &dyn ConversationStore) {
        let first = store.create().await.expect("create should work");
        assert_eq!(first.title, Conversation::PLACEHOLDER_TITLE);
        assert!(first.messages.is_empty());

        store
            .append_messages(
                &first.id,
                vec![
                    ConversationMessage::user("Explain ownership in Rust please"),
                    ConversationMessage::assistant("所有权是 Rust 的核心概念。"),
                ],
            )
            .await
            .expect("append should work");
        store
            .append(&first.id, ConversationMessage::user("And borrowing?"))
            .await
            .expect("single append should work");

        let loaded = store
            .get(&first.id)
            .await
            .expect("get should work")
            .expect("conversation should exist");
        assert_eq!(loaded.title, "Explain ownership in...");
        assert_eq!(loaded.messages.len(), 3);
        assert_eq!(loaded.messages[1].role, MessageRole::Assistant);
        assert_eq!(loaded.messages[2].content, "And borrowing?");

        let second = store.create().await.expect("second create should work");
        let ids = store
            .list()
            .await
            .expect("list should work")
            .into_iter()
            .map(|conversation| conversation.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);

        let missing = store
            .append_messages(
                &ConversationId::from("missing"),
                vec![ConversationMessage::user("hi")],
            )
            .await
            .expect_err("unknown conversation should fail");
        assert_eq!(missing.kind, ChatErrorKind::ConversationNotFound);

        assert!(store.delete(&first.id).await.expect("delete should work"));
        assert!(!store.delete(&first.id).await.expect("second delete should work"));
        assert!(store.get(&first.id).await.expect("get should work").is_none());
        assert_eq!(store.list().await.expect("list should work").len(), 1);
    }

    #[tokio::test]
    async fn in_memory_store_honors_contract() {
        exercise_store_contract(&InMemoryConversationStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_honors_contract() {
        let store = SqliteConversationStore::new_in_memory().expect("sqlite should initialize");
        exercise_store_contract(&store).await;
    }

    #[tokio::test]
    async fn filesystem_store_honors_contract() {
        let root = temp_dir("contract");
        let store = FilesystemConversationStore::new(&root).expect("fs store should initialize");
        exercise_store_contract(&store).await;
        std::fs::remove_dir_all(&root).expect("temporary directory should be removable");
    }

    #[tokio::test]
    async fn sqlite_store_survives_reopen() {
        let root = temp_dir("sqlite-reopen");
        let path = root.join("conversations.sqlite3");

        let id = {
            let store = SqliteConversationStore::new(&path).expect("sqlite should open");
            let conversation = store.create().await.expect("create");
            store
                .append_messages(
                    &conversation.id,
                    vec![
                        ConversationMessage::user("persist me"),
                        ConversationMessage::assistant("已保存"),
                    ],
                )
                .await
                .expect("append");
            conversation.id
        };

        let reopened = SqliteConversationStore::new(&path).expect("sqlite should reopen");
        let loaded = reopened
            .get(&id)
            .await
            .expect("get")
            .expect("conversation should persist");
        assert_eq!(loaded.title, "persist me");
        assert_eq!(loaded.messages[1].content, "已保存");

        drop(reopened);
        std::fs::remove_dir_all(&root).expect("temporary directory should be removable");
    }

    #[tokio::test]
    async fn filesystem_store_reads_unknown_roles_as_assistant() {
        let root = temp_dir("roles");
        let store = FilesystemConversationStore::new(&root).expect("fs store should initialize");
        let conversation = store.create().await.expect("create");

        let file = std::fs::read_dir(root.join("conversations"))
            .expect("read dir")
            .next()
            .expect("one file")
            .expect("entry")
            .path();
        let mut document: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&file).expect("read")).expect("json");
        document["messages"] = serde_json::json!([
            {"role": "user", "content": "question"},
            {"role": "bot", "content": "answer"}
        ]);
        std::fs::write(&file, serde_json::to_vec(&document).expect("encode")).expect("write");

        let loaded = store
            .get(&conversation.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(loaded.messages[1].role, MessageRole::Assistant);

        std::fs::remove_dir_all(&root).expect("temporary directory should be removable");
    }

    #[tokio::test]
    async fn corrupt_file_surfaces_as_store_error() {
        let root = temp_dir("corrupt");
        let store = FilesystemConversationStore::new(&root).expect("fs store should initialize");
        std::fs::write(root.join("conversations").join("00.json"), b"{not json")
            .expect("write");

        let error = store.list().await.expect_err("corrupt file should fail");
        assert_eq!(error.kind, ChatErrorKind::Store);

        std::fs::remove_dir_all(&root).expect("temporary directory should be removable");
    }

    #[tokio::test]
    async fn factory_builds_each_store_kind() {
        let memory = create_conversation_store(StoreConfig::Memory).expect("memory store");
        assert!(memory.list().await.expect("list").is_empty());

        let root = temp_dir("factory");
        let stores: Vec<Arc<dyn ConversationStore>> = vec![
            create_conversation_store(StoreConfig::Sqlite {
                path: root.join("db").join("conversations.sqlite3"),
            })
            .expect("sqlite store"),
            create_conversation_store(StoreConfig::Filesystem {
                root: root.join("files"),
            })
            .expect("fs store"),
        ];
        for store in stores {
            store.create().await.expect("create");
            assert_eq!(store.list().await.expect("list").len(), 1);
        }

        std::fs::remove_dir_all(&root).expect("temporary directory should be removable");
    }

    #[test]
    fn store_config_parse_rejects_unknown_schemes() {
        assert_eq!(
            StoreConfig::parse("sqlite:/var/lib/parley.db").expect("sqlite"),
            StoreConfig::Sqlite {
                path: PathBuf::from("/var/lib/parley.db")
            }
        );
        assert_eq!(
            StoreConfig::parse("postgres://db").expect_err("unknown").kind,
            MemoryErrorKind::InvalidRequest
        );
        assert_eq!(
            StoreConfig::parse("fs:  ").expect_err("empty path").kind,
            MemoryErrorKind::InvalidRequest
        );
    }
}
