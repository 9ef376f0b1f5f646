use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, Result as DbResult, Row};

use crate::models::{ChatSession, CreatedAt, Message, TokenUsage};

/// Stored per-user preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    pub active_chat_id: Option<String>,
    pub selected_model: Option<String>,
}

pub struct DbService;

impl DbService {
    fn row_to_session(row: &Row) -> DbResult<ChatSession> {
        let created_str: String = row.get(2)?;
        let created_at = DateTime::parse_from_rfc3339(&created_str)
            .ok()
            .map(|dt| CreatedAt::from(dt.with_timezone(&Utc)));

        let prompt: Option<i64> = row.get(3)?;
        let completion: Option<i64> = row.get(4)?;
        let total: Option<i64> = row.get(5)?;
        let token_usage = match (prompt, completion, total) {
            (None, None, None) => None,
            (p, c, t) => Some(TokenUsage {
                prompt_tokens: p.unwrap_or(0).max(0) as u64,
                completion_tokens: c.unwrap_or(0).max(0) as u64,
                total_tokens: t.unwrap_or(0).max(0) as u64,
                ..Default::default()
            }),
        };

        Ok(ChatSession {
            id: row.get(0)?,
            title: row.get(1)?,
            messages: Vec::new(),
            created_at,
            token_usage,
            extra: Default::default(),
        })
    }

    fn row_to_message(row: &Row) -> DbResult<Message> {
        let role_str: String = row.get(1)?;
        let role = role_str
            .parse()
            .map_err(|e| duckdb::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

        let tool_calls = match row.get::<_, Option<String>>(4)? {
            Some(raw) => Some(
                serde_json::from_str(&raw)
                    .map_err(|e| duckdb::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
            ),
            None => None,
        };

        Ok(Message {
            id: row.get(0)?,
            role,
            content: row.get(2)?,
            reasoning_content: row.get(6)?,
            model: row.get(3)?,
            tool_calls,
            tool_call_id: row.get(5)?,
            extra: Default::default(),
        })
    }

    // --- Session Operations ---

    pub fn list_sessions(conn: &Connection, user_id: Option<&str>) -> DbResult<Vec<ChatSession>> {
        let mut sessions = match user_id {
            Some(user_id) => {
                let mut stmt = conn.prepare(
                    "SELECT id, title, created_at, prompt_tokens, completion_tokens, total_tokens
                     FROM chat_sessions WHERE user_id = ? ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map(params![user_id], Self::row_to_session)?;
                rows.collect::<DbResult<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, title, created_at, prompt_tokens, completion_tokens, total_tokens
                     FROM chat_sessions WHERE user_id IS NULL ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map(params![], Self::row_to_session)?;
                rows.collect::<DbResult<Vec<_>>>()?
            }
        };

        for session in &mut sessions {
            session.messages = Self::get_messages(conn, &session.id)?;
        }
        Ok(sessions)
    }

    pub fn get_messages(conn: &Connection, session_id: &str) -> DbResult<Vec<Message>> {
        let mut stmt = conn.prepare(
            "SELECT id, role, content, model, tool_calls, tool_call_id, reasoning_content
             FROM messages
             WHERE session_id = ?
             ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![session_id], Self::row_to_message)?;
        rows.collect()
    }

    pub fn session_exists(conn: &Connection, id: &str, user_id: Option<&str>) -> DbResult<bool> {
        let count: i64 = match user_id {
            Some(user_id) => conn.query_row(
                "SELECT COUNT(*) FROM chat_sessions WHERE id = ? AND user_id = ?",
                params![id, user_id],
                |row| row.get(0),
            )?,
            None => conn.query_row(
                "SELECT COUNT(*) FROM chat_sessions WHERE id = ? AND user_id IS NULL",
                params![id],
                |row| row.get(0),
            )?,
        };
        Ok(count > 0)
    }

    fn session_ids(conn: &Connection, user_id: Option<&str>) -> DbResult<Vec<String>> {
        match user_id {
            Some(user_id) => {
                let mut stmt = conn.prepare("SELECT id FROM chat_sessions WHERE user_id = ?")?;
                let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
                rows.collect()
            }
            None => {
                let mut stmt = conn.prepare("SELECT id FROM chat_sessions WHERE user_id IS NULL")?;
                let rows = stmt.query_map(params![], |row| row.get(0))?;
                rows.collect()
            }
        }
    }

    fn delete_session(conn: &Connection, id: &str) -> DbResult<()> {
        // Messages first, the session row second
        conn.execute("DELETE FROM messages WHERE session_id = ?", params![id])?;
        conn.execute("DELETE FROM chat_sessions WHERE id = ?", params![id])?;
        Ok(())
    }

    /// Makes the stored session set for `user_id` equal to `sessions`: missing
    /// sessions are deleted, the rest are upserted with their messages rewritten.
    pub fn replace_sessions(
        conn: &Connection,
        user_id: Option<&str>,
        sessions: &[ChatSession],
    ) -> DbResult<()> {
        in_transaction(conn, |conn| {
            let keep: HashSet<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
            for id in Self::session_ids(conn, user_id)? {
                if !keep.contains(id.as_str()) {
                    Self::delete_session(conn, &id)?;
                }
            }

            for session in sessions {
                let usage = session.token_usage;
                let prompt = usage.map(|u| u.prompt_tokens as i64);
                let completion = usage.map(|u| u.completion_tokens as i64);
                let total = usage.map(|u| u.total_tokens as i64);

                let exists: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM chat_sessions WHERE id = ?",
                    params![session.id],
                    |row| row.get(0),
                )?;

                if exists > 0 {
                    conn.execute(
                        "UPDATE chat_sessions
                         SET title = ?, prompt_tokens = ?, completion_tokens = ?, total_tokens = ?
                         WHERE id = ?",
                        params![session.title, prompt, completion, total, session.id],
                    )?;
                } else {
                    let created_at = session
                        .created_at
                        .as_ref()
                        .and_then(CreatedAt::to_datetime)
                        .unwrap_or_else(Utc::now)
                        .to_rfc3339_opts(SecondsFormat::Millis, true);
                    conn.execute(
                        "INSERT INTO chat_sessions
                         (id, user_id, title, created_at, prompt_tokens, completion_tokens, total_tokens)
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                        params![session.id, user_id, session.title, created_at, prompt, completion, total],
                    )?;
                }

                conn.execute("DELETE FROM messages WHERE session_id = ?", params![session.id])?;

                for (position, message) in session.messages.iter().enumerate() {
                    let tool_calls = message.tool_calls.as_ref().map(|v| v.to_string());
                    conn.execute(
                        "INSERT INTO messages
                         (id, session_id, position, role, content, model, tool_calls, tool_call_id, reasoning_content)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                        params![
                            message.id,
                            session.id,
                            position as i64,
                            message.role.as_str(),
                            message.content,
                            message.model,
                            tool_calls,
                            message.tool_call_id,
                            message.reasoning_content
                        ],
                    )?;
                }
            }
            Ok(())
        })
    }

    // --- Preference Operations ---

    /// Preferences are keyed by user id, with `""` standing in for the anonymous user.
    pub fn get_preferences(conn: &Connection, user_key: &str) -> DbResult<Preferences> {
        let mut stmt = conn.prepare(
            "SELECT active_chat_id, selected_model FROM user_preferences WHERE user_id = ?",
        )?;
        let mut rows = stmt.query_map(params![user_key], |row| {
            Ok(Preferences {
                active_chat_id: row.get(0)?,
                selected_model: row.get(1)?,
            })
        })?;

        match rows.next() {
            Some(row) => row,
            None => Ok(Preferences::default()),
        }
    }

    pub fn set_active_chat_id(conn: &Connection, user_key: &str, id: &str) -> DbResult<()> {
        Self::upsert_preference(conn, user_key, "active_chat_id", id)
    }

    pub fn set_selected_model(conn: &Connection, user_key: &str, model: &str) -> DbResult<()> {
        Self::upsert_preference(conn, user_key, "selected_model", model)
    }

    fn upsert_preference(conn: &Connection, user_key: &str, column: &str, value: &str) -> DbResult<()> {
        in_transaction(conn, |conn| {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM user_preferences WHERE user_id = ?",
                params![user_key],
                |row| row.get(0),
            )?;

            // `column` is one of two fixed names, never user input.
            if exists > 0 {
                conn.execute(
                    &format!(
                        "UPDATE user_preferences SET {} = ?, updated_at = CURRENT_TIMESTAMP WHERE user_id = ?",
                        column
                    ),
                    params![value, user_key],
                )?;
            } else {
                conn.execute(
                    &format!("INSERT INTO user_preferences (user_id, {}) VALUES (?, ?)", column),
                    params![user_key, value],
                )?;
            }
            Ok(())
        })
    }

    /// Deletes every session, message and preference owned by `user_id`.
    pub fn clear_user(conn: &Connection, user_id: Option<&str>) -> DbResult<()> {
        in_transaction(conn, |conn| {
            for id in Self::session_ids(conn, user_id)? {
                Self::delete_session(conn, &id)?;
            }
            conn.execute(
                "DELETE FROM user_preferences WHERE user_id = ?",
                params![user_id.unwrap_or("")],
            )?;
            Ok(())
        })
    }
}

fn in_transaction<T>(conn: &Connection, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
    conn.execute_batch("BEGIN TRANSACTION")?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}
