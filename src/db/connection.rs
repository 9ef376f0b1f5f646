use duckdb::{Connection, Result as DbResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

pub type DbPool = Arc<Mutex<Connection>>;

// No key constraints: DuckDB rejects deleting and re-inserting the same key
// inside one transaction, which is exactly how a session's messages are rewritten.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_sessions (
    id VARCHAR NOT NULL,
    user_id VARCHAR,
    title VARCHAR NOT NULL,
    created_at VARCHAR NOT NULL,
    prompt_tokens BIGINT,
    completion_tokens BIGINT,
    total_tokens BIGINT
);

CREATE TABLE IF NOT EXISTS messages (
    id VARCHAR NOT NULL,
    session_id VARCHAR NOT NULL,
    position INTEGER NOT NULL,
    role VARCHAR NOT NULL,
    content TEXT NOT NULL,
    model VARCHAR,
    tool_calls VARCHAR,
    tool_call_id VARCHAR,
    reasoning_content TEXT
);

CREATE TABLE IF NOT EXISTS user_preferences (
    user_id VARCHAR NOT NULL,
    active_chat_id VARCHAR,
    selected_model VARCHAR,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
"#;

/// Opens (or creates) the database behind a `duckdb://<path>` url or a bare
/// path. `:memory:` gives a throwaway in-memory database.
pub fn get_connection(url: &str) -> DbResult<DbPool> {
    let path = url.strip_prefix("duckdb://").unwrap_or(url);
    info!("Connecting to DuckDB at {}", path);
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };

    init_schema(&conn)?;

    Ok(Arc::new(Mutex::new(conn)))
}

fn init_schema(conn: &Connection) -> DbResult<()> {
    info!("Initializing database schema");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
