use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::Session;

/// Create a new session for `username`, pruning expired ones first. Returns the session token.
pub fn create_session(
    conn: &Connection,
    username: &str,
    hours: u64,
) -> Result<String, rusqlite::Error> {
    let pruned = delete_expired_sessions(conn)?;
    if pruned > 0 {
        tracing::debug!("Pruned {} expired sessions", pruned);
    }

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, username, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, username, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Look up an unexpired session by token.
pub fn find_session(conn: &Connection, token: &str) -> Result<Option<Session>, rusqlite::Error> {
    conn.query_row(
        "SELECT id, username, token, expires_at, created_at FROM sessions
         WHERE token = ?1 AND expires_at > datetime('now')",
        params![token],
        |row| {
            Ok(Session {
                id: row.get(0)?,
                username: row.get(1)?,
                token: row.get(2)?,
                expires_at: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
    .optional()
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Remove every session whose expiry has passed. Returns the number removed.
pub fn delete_expired_sessions(conn: &Connection) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
