use crate::chat::transcript::TranscriptEntry;
use crate::db::models::{ChatMessage, Conversation, ROLE_ASSISTANT, ROLE_USER};
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection, Result as DbResult, Row};
use uuid::Uuid;

const CONVERSATION_COLUMNS: &str =
    "id, user_id, title, CAST(created_at AS VARCHAR), CAST(updated_at AS VARCHAR)";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, user_id, role, content, CAST(created_at AS VARCHAR)";

pub struct DbService;

impl DbService {
    fn row_to_conversation(row: &Row) -> DbResult<Conversation> {
        Ok(Conversation {
            id: row.get::<_, String>(0)?.parse().unwrap_or_default(),
            user_id: row.get(1)?,
            title: row.get(2)?,
            created_at: parse_timestamp(&row.get::<_, String>(3)?),
            updated_at: parse_timestamp(&row.get::<_, String>(4)?),
        })
    }

    fn row_to_message(row: &Row) -> DbResult<ChatMessage> {
        Ok(ChatMessage {
            id: row.get(0)?,
            conversation_id: row.get::<_, String>(1)?.parse().unwrap_or_default(),
            user_id: row.get(2)?,
            role: row.get(3)?,
            content: row.get(4)?,
            created_at: parse_timestamp(&row.get::<_, String>(5)?),
        })
    }

    /// Runs `f` inside BEGIN/COMMIT, rolling back when it fails.
    fn in_transaction<T>(
        conn: &Connection,
        f: impl FnOnce(&Connection) -> DbResult<T>,
    ) -> DbResult<T> {
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

    // --- Conversation Operations ---

    pub fn insert_conversation(conn: &Connection, user_id: &str, title: &str) -> DbResult<Conversation> {
        let id = Uuid::new_v4();

        conn.execute(
            "INSERT INTO conversations (id, user_id, title) VALUES (?, ?, ?)",
            params![id.to_string(), user_id, title],
        )?;

        conn.query_row(
            &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"),
            params![id.to_string()],
            Self::row_to_conversation,
        )
    }

    pub fn get_conversation(conn: &Connection, id: Uuid) -> DbResult<Option<Conversation>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"
        ))?;
        let mut rows = stmt.query_map(params![id.to_string()], Self::row_to_conversation)?;

        rows.next().transpose()
    }

    /// Like `get_conversation`, but hides conversations that belong to someone else.
    pub fn get_owned_conversation(
        conn: &Connection,
        id: Uuid,
        user_id: &str,
    ) -> DbResult<Option<Conversation>> {
        Ok(Self::get_conversation(conn, id)?.filter(|c| c.user_id == user_id))
    }

    /// Most recently updated first. `None` lists every user's conversations.
    pub fn list_conversations(
        conn: &Connection,
        user_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> DbResult<Vec<Conversation>> {
        let rows = match user_id {
            Some(user_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE user_id = ? \
                     ORDER BY updated_at DESC, created_at DESC LIMIT ? OFFSET ?"
                ))?;
                let rows = stmt.query_map(
                    params![user_id, limit as i64, offset as i64],
                    Self::row_to_conversation,
                )?;
                rows.collect::<DbResult<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                     ORDER BY updated_at DESC, created_at DESC LIMIT ? OFFSET ?"
                ))?;
                let rows = stmt.query_map(
                    params![limit as i64, offset as i64],
                    Self::row_to_conversation,
                )?;
                rows.collect::<DbResult<Vec<_>>>()?
            }
        };
        Ok(rows)
    }

    pub fn delete_conversation(conn: &Connection, id: Uuid) -> DbResult<()> {
        let id_str = id.to_string();

        Self::in_transaction(conn, |conn| {
            conn.execute(
                "DELETE FROM chat_messages WHERE conversation_id = ?",
                params![id_str],
            )?;
            conn.execute("DELETE FROM conversations WHERE id = ?", params![id_str])?;
            Ok(())
        })
    }

    // --- Message Operations ---

    fn insert_message_row(
        conn: &Connection,
        conversation_id: Uuid,
        user_id: &str,
        role: &str,
        content: &str,
    ) -> DbResult<ChatMessage> {
        let id: i64 = conn.query_row("SELECT nextval('seq_chat_messages_id')", [], |row| row.get(0))?;

        conn.execute(
            "INSERT INTO chat_messages (id, conversation_id, user_id, role, content) VALUES (?, ?, ?, ?, ?)",
            params![id, conversation_id.to_string(), user_id, role, content],
        )?;

        conn.query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = ?"),
            params![id],
            Self::row_to_message,
        )
    }

    fn touch_conversation(conn: &Connection, conversation_id: Uuid) -> DbResult<()> {
        conn.execute(
            "UPDATE conversations SET updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![conversation_id.to_string()],
        )?;
        Ok(())
    }

    pub fn insert_message(
        conn: &Connection,
        conversation_id: Uuid,
        user_id: &str,
        role: &str,
        content: &str,
    ) -> DbResult<ChatMessage> {
        let message = Self::insert_message_row(conn, conversation_id, user_id, role, content)?;
        Self::touch_conversation(conn, conversation_id)?;
        Ok(message)
    }

    /// Stores a user turn and the assistant reply together, or neither.
    pub fn insert_exchange(
        conn: &Connection,
        conversation_id: Uuid,
        user_id: &str,
        user_text: &str,
        reply_text: &str,
    ) -> DbResult<(ChatMessage, ChatMessage)> {
        Self::in_transaction(conn, |conn| {
            let user_msg = Self::insert_message_row(conn, conversation_id, user_id, ROLE_USER, user_text)?;
            let reply_msg =
                Self::insert_message_row(conn, conversation_id, user_id, ROLE_ASSISTANT, reply_text)?;
            Self::touch_conversation(conn, conversation_id)?;
            Ok((user_msg, reply_msg))
        })
    }

    pub fn get_messages(
        conn: &Connection,
        conversation_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> DbResult<Vec<ChatMessage>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE conversation_id = ? \
             ORDER BY id ASC LIMIT ? OFFSET ?"
        ))?;

        let rows = stmt.query_map(
            params![conversation_id.to_string(), limit as i64, offset as i64],
            Self::row_to_message,
        )?;
        rows.collect()
    }

    pub fn all_messages(conn: &Connection, conversation_id: Uuid) -> DbResult<Vec<ChatMessage>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE conversation_id = ? ORDER BY id ASC"
        ))?;

        let rows = stmt.query_map(params![conversation_id.to_string()], Self::row_to_message)?;
        rows.collect()
    }

    /// The last `n` messages of a conversation, oldest first.
    pub fn recent_messages(conn: &Connection, conversation_id: Uuid, n: usize) -> DbResult<Vec<ChatMessage>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM (\
                SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE conversation_id = ? \
                ORDER BY id DESC LIMIT ?\
             ) ORDER BY 1 ASC"
        ))?;

        let rows = stmt.query_map(
            params![conversation_id.to_string(), n as i64],
            Self::row_to_message,
        )?;
        rows.collect()
    }

    pub fn import_transcript(
        conn: &Connection,
        user_id: &str,
        title: &str,
        entries: &[TranscriptEntry],
    ) -> DbResult<Conversation> {
        Self::in_transaction(conn, |conn| {
            let conversation = Self::insert_conversation(conn, user_id, title)?;
            for entry in entries {
                Self::insert_message_row(conn, conversation.id, user_id, &entry.role, &entry.content)?;
            }
            Ok(conversation)
        })
    }
}

/// DuckDB renders `TIMESTAMP` as `2024-05-01 12:30:00.123456` when cast to text.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(ts) = raw.parse::<DateTime<Utc>>() {
        return ts;
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now)
}
