#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chatgate::cache::{AvailabilityTracker, KvSessionStore, MemoryBackend};
    use chatgate::models::{ChatSession, Message, Role, StorageOptions, StorageType};
    use chatgate::storage::{LocalStorageService, LocalStore, StorageService, StorageServiceFactory};
    use serde_json::{json, Value};

    fn session(title: &str) -> ChatSession {
        let mut session = ChatSession::new(title);
        session.messages.push(Message::new(Role::User, "hello"));
        session.messages.push(Message::new(Role::Assistant, "hi there"));
        session
    }

    fn factory() -> StorageServiceFactory {
        let cache = KvSessionStore::new(Arc::new(MemoryBackend::new()), Arc::new(AvailabilityTracker::new()));
        StorageServiceFactory::new(LocalStore::in_memory(), cache)
    }

    #[tokio::test]
    async fn test_empty_reads() {
        let storage = LocalStorageService::new(LocalStore::in_memory(), Some("alice".into()));
        assert!(storage.get_chat_sessions().await.unwrap().is_empty());
        assert_eq!(storage.get_active_chat_id().await.unwrap(), "");
        assert_eq!(storage.get_selected_model().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_round_trip_and_namespacing() {
        let store = LocalStore::in_memory();
        let alice = LocalStorageService::new(store.clone(), Some("alice".into()));
        let bob = LocalStorageService::new(store.clone(), Some("bob".into()));

        let sessions = vec![session("first"), session("second")];
        alice.save_chat_sessions(&sessions).await.unwrap();
        alice.save_selected_model("gpt-4o").await.unwrap();

        assert_eq!(alice.get_chat_sessions().await.unwrap(), sessions);
        assert_eq!(alice.get_selected_model().await.unwrap(), "gpt-4o");
        assert!(bob.get_chat_sessions().await.unwrap().is_empty());
        assert!(store.contains("alice_chatSessions"));
        assert!(store.contains("alice_selectedModel"));
    }

    #[tokio::test]
    async fn test_active_id_falls_back_to_first_session() {
        let store = LocalStore::in_memory();
        let storage = LocalStorageService::new(store.clone(), None);
        let sessions = vec![session("first"), session("second")];
        storage.save_chat_sessions(&sessions).await.unwrap();

        assert_eq!(storage.get_active_chat_id().await.unwrap(), sessions[0].id);
        // The fallback is persisted.
        assert_eq!(store.get_item("activeChatId").as_deref(), Some(sessions[0].id.as_str()));
    }

    #[tokio::test]
    async fn test_corrupt_sessions_read_as_empty() {
        let store = LocalStore::in_memory();
        store.set_item("chatSessions", "{not json").unwrap();
        let storage = LocalStorageService::new(store, None);
        assert!(storage.get_chat_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_all_keys() {
        let store = LocalStore::in_memory();
        let storage = LocalStorageService::new(store.clone(), Some("carol".into()));
        storage.save_chat_sessions(&[session("x")]).await.unwrap();
        storage.save_active_chat_id("abc").await.unwrap();
        storage.save_selected_model("m").await.unwrap();

        storage.clear().await.unwrap();
        assert!(!store.contains("carol_chatSessions"));
        assert!(!store.contains("carol_activeChatId"));
        assert!(!store.contains("carol_selectedModel"));
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        {
            let storage = LocalStorageService::new(LocalStore::open(&path).unwrap(), None);
            storage.save_selected_model("llama3").await.unwrap();
        }

        let reopened = LocalStorageService::new(LocalStore::open(&path).unwrap(), None);
        assert_eq!(reopened.get_selected_model().await.unwrap(), "llama3");
    }

    #[tokio::test]
    async fn test_factory_relational_without_url_falls_back_to_local() {
        let factory = factory();
        let storage = factory.create_service(&StorageOptions {
            storage_type: StorageType::Relational,
            user_id: Some("dave".into()),
            connection_url: None,
        });

        storage.save_selected_model("mistral").await.unwrap();
        assert_eq!(storage.get_selected_model().await.unwrap(), "mistral");
        assert_eq!(
            factory.local_store().get_item("dave_selectedModel").as_deref(),
            Some("mistral")
        );
    }

    #[tokio::test]
    async fn test_factory_redis_uses_shared_cache() {
        let factory = factory();
        let options = StorageOptions {
            storage_type: StorageType::Redis,
            user_id: Some("erin".into()),
            connection_url: None,
        };

        factory.create_service(&options).save_active_chat_id("s-1").await.unwrap();
        assert_eq!(
            factory.create_service(&options).get_active_chat_id().await.unwrap(),
            "s-1"
        );
        assert_eq!(
            factory
                .cache_store()
                .get(Some("erin"), chatgate::models::BaseKey::ActiveChatId)
                .await
                .unwrap()
                .as_deref(),
            Some("s-1")
        );
    }

    #[tokio::test]
    async fn test_cache_storage_reports_unavailable() {
        let tracker = Arc::new(AvailabilityTracker::new());
        let cache = KvSessionStore::new(Arc::new(MemoryBackend::new()), tracker.clone());
        let factory = StorageServiceFactory::new(LocalStore::in_memory(), cache);
        for _ in 0..5 {
            tracker.record_error("down");
        }

        let storage = factory.create_service(&StorageOptions {
            storage_type: StorageType::Redis,
            user_id: None,
            connection_url: None,
        });
        let err = storage.get_chat_sessions().await.unwrap_err();
        assert!(matches!(err, chatgate::storage::StorageError::Unavailable));
    }

    fn browser_sessions() -> Value {
        json!([{
            "id": "1714564800000",
            "title": "Weather",
            "createdAt": 1714564800000i64,
            "messages": [
                { "id": "m1", "role": "user", "content": "rain today?" },
                {
                    "id": "m2",
                    "role": "assistant",
                    "content": "Probably.",
                    "reasoning_content": "checked the forecast",
                    "model": "deepseek/deepseek-reasoner"
                }
            ],
            "tokenUsage": {
                "prompt_tokens": 10,
                "completion_tokens": 5,
                "total_tokens": 15,
                "queue_time": 0.02,
                "total_time": 0.4
            }
        }])
    }

    #[tokio::test]
    async fn test_browser_written_sessions_are_read_and_kept_verbatim() {
        let store = LocalStore::in_memory();
        store
            .set_item("grace_chatSessions", &browser_sessions().to_string())
            .unwrap();
        let storage = LocalStorageService::new(store.clone(), Some("grace".into()));

        let sessions = storage.get_chat_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions[0].messages[1].reasoning_content.as_deref(),
            Some("checked the forecast")
        );

        storage.save_chat_sessions(&sessions).await.unwrap();
        let saved: Value = serde_json::from_str(&store.get_item("grace_chatSessions").unwrap()).unwrap();
        assert_eq!(saved, browser_sessions());
    }

    #[tokio::test]
    async fn test_cache_variant_keeps_client_fields() {
        let factory = factory();
        let storage = factory.create_service(&StorageOptions {
            storage_type: StorageType::Redis,
            user_id: Some("heidi".into()),
            connection_url: None,
        });

        let sessions: Vec<ChatSession> = serde_json::from_value(browser_sessions()).unwrap();
        storage.save_chat_sessions(&sessions).await.unwrap();

        let loaded = storage.get_chat_sessions().await.unwrap();
        assert_eq!(loaded, sessions);
        assert_eq!(serde_json::to_value(&loaded).unwrap(), browser_sessions());
    }
}
