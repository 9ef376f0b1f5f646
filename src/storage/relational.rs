use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::db::{DbPool, DbService};
use crate::models::ChatSession;
use crate::storage::{StorageError, StorageService};

const MAX_TITLE_LEN: usize = 500;
const MAX_CONTENT_LEN: usize = 50_000;
const MAX_MODEL_LEN: usize = 100;
const MAX_USER_ID_LEN: usize = 255;

pub fn is_valid_uuid(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok()
}

/// Bounded length and no control characters besides whitespace.
pub fn is_safe_string(value: &str, max_len: usize) -> bool {
    value.chars().count() <= max_len && !value.chars().any(|c| c.is_control() && !c.is_whitespace())
}

fn validate_sessions(sessions: &[ChatSession]) -> Result<(), StorageError> {
    for session in sessions {
        if !is_valid_uuid(&session.id) {
            return Err(StorageError::Validation(format!("invalid session id: {}", session.id)));
        }
        if !is_safe_string(&session.title, MAX_TITLE_LEN) {
            return Err(StorageError::Validation(format!(
                "invalid title for session {}",
                session.id
            )));
        }
        for message in &session.messages {
            if !is_valid_uuid(&message.id) {
                return Err(StorageError::Validation(format!("invalid message id: {}", message.id)));
            }
            if !is_safe_string(&message.content, MAX_CONTENT_LEN) {
                return Err(StorageError::Validation(format!(
                    "invalid content for message {}",
                    message.id
                )));
            }
            if let Some(reasoning) = message.reasoning_content.as_deref() {
                if !is_safe_string(reasoning, MAX_CONTENT_LEN) {
                    return Err(StorageError::Validation(format!(
                        "invalid reasoning content for message {}",
                        message.id
                    )));
                }
            }
            if let Some(model) = message.model.as_deref() {
                if !is_safe_string(model, MAX_MODEL_LEN) {
                    return Err(StorageError::Validation(format!(
                        "invalid model for message {}",
                        message.id
                    )));
                }
            }
        }
    }
    Ok(())
}

/// DuckDB-backed storage scoped to one user.
pub struct RelationalStorageService {
    pool: DbPool,
    user_id: Option<String>,
}

impl RelationalStorageService {
    pub fn new(pool: DbPool, user_id: Option<String>) -> Result<Self, StorageError> {
        if let Some(user_id) = user_id.as_deref() {
            if user_id.is_empty() || !is_safe_string(user_id, MAX_USER_ID_LEN) {
                return Err(StorageError::Validation("invalid user id".to_string()));
            }
        }
        Ok(Self { pool, user_id })
    }

    fn user(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Preference rows use `""` for the anonymous user.
    fn preference_key(&self) -> &str {
        self.user_id.as_deref().unwrap_or("")
    }

    fn logged<T>(&self, op: &str, result: duckdb::Result<T>) -> Result<T, StorageError> {
        result.map_err(|e| {
            error!(error = %e, user_id = ?self.user_id, operation = op, "Relational storage operation failed");
            StorageError::from(e)
        })
    }
}

#[async_trait]
impl StorageService for RelationalStorageService {
    async fn get_chat_sessions(&self) -> Result<Vec<ChatSession>, StorageError> {
        let result = {
            let conn = self.pool.lock();
            DbService::list_sessions(&conn, self.user())
        };
        self.logged("get_chat_sessions", result)
    }

    async fn save_chat_sessions(&self, sessions: &[ChatSession]) -> Result<(), StorageError> {
        validate_sessions(sessions)?;
        let result = {
            let conn = self.pool.lock();
            DbService::replace_sessions(&conn, self.user(), sessions)
        };
        self.logged("save_chat_sessions", result)
    }

    async fn get_active_chat_id(&self) -> Result<String, StorageError> {
        let result = {
            let conn = self.pool.lock();
            resolve_active_chat_id(&conn, self.user(), self.preference_key())
        };
        self.logged("get_active_chat_id", result)
    }

    async fn save_active_chat_id(&self, id: &str) -> Result<(), StorageError> {
        if !is_valid_uuid(id) {
            return Err(StorageError::Validation(format!("invalid session id: {}", id)));
        }
        let result = {
            let conn = self.pool.lock();
            DbService::session_exists(&conn, id, self.user()).and_then(|exists| {
                if !exists {
                    warn!(user_id = ?self.user_id, active_chat_id = id, "Active chat id does not match a stored session");
                }
                DbService::set_active_chat_id(&conn, self.preference_key(), id)
            })
        };
        self.logged("save_active_chat_id", result)
    }

    async fn get_selected_model(&self) -> Result<String, StorageError> {
        let result = {
            let conn = self.pool.lock();
            DbService::get_preferences(&conn, self.preference_key())
        };
        let prefs = self.logged("get_selected_model", result)?;
        Ok(prefs.selected_model.unwrap_or_default())
    }

    async fn save_selected_model(&self, model: &str) -> Result<(), StorageError> {
        if !is_safe_string(model, MAX_MODEL_LEN) {
            return Err(StorageError::Validation("invalid model name".to_string()));
        }
        let result = {
            let conn = self.pool.lock();
            DbService::set_selected_model(&conn, self.preference_key(), model)
        };
        self.logged("save_selected_model", result)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let result = {
            let conn = self.pool.lock();
            DbService::clear_user(&conn, self.user())
        };
        self.logged("clear", result)?;
        info!(user_id = ?self.user_id, "Cleared relational storage");
        Ok(())
    }

    /// The pool is shared with other services, so closing only flushes the WAL.
    async fn close(&self) -> Result<(), StorageError> {
        let result = {
            let conn = self.pool.lock();
            conn.execute_batch("CHECKPOINT")
        };
        self.logged("close", result)
    }
}

fn resolve_active_chat_id(
    conn: &duckdb::Connection,
    user_id: Option<&str>,
    preference_key: &str,
) -> duckdb::Result<String> {
    let prefs = DbService::get_preferences(conn, preference_key)?;
    if let Some(id) = prefs.active_chat_id.filter(|id| !id.is_empty()) {
        return Ok(id);
    }

    // Newest session wins when nothing has been selected yet.
    let sessions = DbService::list_sessions(conn, user_id)?;
    match sessions.first() {
        Some(session) => Ok(session.id.clone()),
        None => Ok(String::new()),
    }
}
