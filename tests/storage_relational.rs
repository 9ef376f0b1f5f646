#[cfg(test)]
mod tests {
    use chatgate::db::{self, DbPool};
    use chatgate::models::{ChatSession, CreatedAt, Message, Role, TokenUsage};
    use chatgate::storage::{RelationalStorageService, StorageError, StorageService};
    use chrono::{Duration, TimeZone, Utc};

    fn pool() -> DbPool {
        db::get_connection(":memory:").unwrap()
    }

    fn service(pool: &DbPool, user: Option<&str>) -> RelationalStorageService {
        RelationalStorageService::new(pool.clone(), user.map(str::to_string)).unwrap()
    }

    fn session(title: &str, minutes: i64) -> ChatSession {
        let mut session = ChatSession::new(title);
        session.created_at = Some((Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)).into());
        session.messages.push(Message::new(Role::System, "be brief"));
        session.messages.push(Message::new(Role::User, "what is rust?"));
        let mut answer = Message::new(Role::Assistant, "A systems language.");
        answer.model = Some("gpt-4o".into());
        session.messages.push(answer);
        session
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order_and_usage() {
        let pool = pool();
        let storage = service(&pool, Some("alice"));

        let mut first = session("first", 0);
        first.token_usage = Some(TokenUsage {
            prompt_tokens: 12,
            completion_tokens: 30,
            total_tokens: 42,
            ..Default::default()
        });
        let second = session("second", 5);

        storage.save_chat_sessions(&[first.clone(), second.clone()]).await.unwrap();
        let loaded = storage.get_chat_sessions().await.unwrap();

        // Newest first.
        assert_eq!(loaded, vec![second, first]);
    }

    #[tokio::test]
    async fn test_saving_smaller_set_deletes_missing_sessions() {
        let pool = pool();
        let storage = service(&pool, Some("alice"));

        let keep = session("keep", 0);
        let drop = session("drop", 1);
        storage.save_chat_sessions(&[keep.clone(), drop]).await.unwrap();

        let mut edited = keep.clone();
        edited.title = "kept and renamed".into();
        edited.append_stream_delta("more");
        storage.save_chat_sessions(&[edited.clone()]).await.unwrap();

        let loaded = storage.get_chat_sessions().await.unwrap();
        assert_eq!(loaded, vec![edited]);
    }

    #[tokio::test]
    async fn test_invalid_ids_are_rejected() {
        let pool = pool();
        let storage = service(&pool, None);

        let mut bad = session("bad", 0);
        bad.id = "not-a-uuid".into();
        let err = storage.save_chat_sessions(&[bad]).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        let mut bad_message = session("bad message", 0);
        bad_message.messages[0].id = "1".into();
        let err = storage.save_chat_sessions(&[bad_message]).await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        let err = storage.save_active_chat_id("42").await.unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));

        assert!(storage.get_chat_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_and_control_strings_are_rejected() {
        let pool = pool();
        let storage = service(&pool, None);

        let mut long_title = session("x", 0);
        long_title.title = "t".repeat(501);
        assert!(storage.save_chat_sessions(&[long_title]).await.is_err());

        let mut control = session("x", 0);
        control.messages[1].content = "null\u{0}byte".into();
        assert!(storage.save_chat_sessions(&[control]).await.is_err());

        assert!(storage.save_selected_model(&"m".repeat(101)).await.is_err());
        assert!(RelationalStorageService::new(pool.clone(), Some("bad\u{1b}user".into())).is_err());
    }

    #[tokio::test]
    async fn test_active_chat_and_model_preferences() {
        let pool = pool();
        let storage = service(&pool, Some("bob"));

        assert_eq!(storage.get_active_chat_id().await.unwrap(), "");
        assert_eq!(storage.get_selected_model().await.unwrap(), "");

        let older = session("older", 0);
        let newer = session("newer", 10);
        storage.save_chat_sessions(&[older.clone(), newer.clone()]).await.unwrap();

        // Nothing selected yet: newest session.
        assert_eq!(storage.get_active_chat_id().await.unwrap(), newer.id);

        storage.save_active_chat_id(&older.id).await.unwrap();
        assert_eq!(storage.get_active_chat_id().await.unwrap(), older.id);

        storage.save_selected_model("llama3").await.unwrap();
        storage.save_selected_model("mistral").await.unwrap();
        assert_eq!(storage.get_selected_model().await.unwrap(), "mistral");
    }

    #[tokio::test]
    async fn test_clear_only_touches_calling_user() {
        let pool = pool();
        let alice = service(&pool, Some("alice"));
        let bob = service(&pool, Some("bob"));

        let a = session("alice's", 0);
        let b = session("bob's", 0);
        alice.save_chat_sessions(&[a.clone()]).await.unwrap();
        alice.save_selected_model("gpt-4o").await.unwrap();
        bob.save_chat_sessions(&[b.clone()]).await.unwrap();
        bob.save_selected_model("llama3").await.unwrap();

        alice.clear().await.unwrap();

        assert!(alice.get_chat_sessions().await.unwrap().is_empty());
        assert_eq!(alice.get_selected_model().await.unwrap(), "");
        assert_eq!(bob.get_chat_sessions().await.unwrap(), vec![b]);
        assert_eq!(bob.get_selected_model().await.unwrap(), "llama3");
    }

    #[tokio::test]
    async fn test_anonymous_sessions_are_separate() {
        let pool = pool();
        let anonymous = service(&pool, None);
        let named = service(&pool, Some("carol"));

        anonymous.save_chat_sessions(&[session("anon", 0)]).await.unwrap();
        assert!(named.get_chat_sessions().await.unwrap().is_empty());
        assert_eq!(anonymous.get_chat_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_epoch_millis_and_reasoning_are_stored() {
        let pool = pool();
        let storage = service(&pool, Some("frank"));

        let mut browser = session("from the browser", 0);
        browser.created_at = Some(CreatedAt::Millis(1_714_564_800_000));
        browser.messages[2].reasoning_content = Some("short answer first".into());
        storage.save_chat_sessions(&[browser.clone()]).await.unwrap();

        let loaded = storage.get_chat_sessions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded[0].created_at,
            Some(CreatedAt::Iso("2024-05-01T12:00:00.000Z".into()))
        );
        assert_eq!(
            loaded[0].messages[2].reasoning_content.as_deref(),
            Some("short answer first")
        );
    }
}
