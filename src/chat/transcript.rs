//! Plain-text conversation transcripts, used by the export/import endpoints
//! and the matching CLI subcommands.
//!
//! ```text
//! Conversation: Trip planning
//! ID: 0b7c...
//! Created At: 2024-05-01 12:30:00 UTC
//! ---
//! [USER]: Where should I go?
//! ---
//! [ASSISTANT]: Somewhere warm.
//! ---
//! ```

use thiserror::Error;

use crate::db::models::{ChatMessage, Conversation, ROLE_ASSISTANT, ROLE_USER};

pub const SEPARATOR: &str = "---";
pub const DEFAULT_IMPORT_TITLE: &str = "Imported Conversation";

/// Prefixed to content lines that equal the separator or already start with it.
const ESCAPE: char = '\\';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Transcript contains no messages")]
    Empty,
    #[error("Unsupported role '{0}' in transcript")]
    UnknownRole(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub title: String,
    pub entries: Vec<TranscriptEntry>,
}

pub fn render(conversation: &Conversation, messages: &[ChatMessage]) -> String {
    let mut export = String::new();
    export.push_str(&format!("Conversation: {}\n", conversation.title));
    export.push_str(&format!("ID: {}\n", conversation.id));
    export.push_str(&format!("Created At: {}\n", conversation.created_at));
    export.push_str(SEPARATOR);
    export.push('\n');

    for m in messages {
        let content: Vec<String> = m.content.split('\n').map(escape_line).collect();
        export.push_str(&format!("[{}]: {}\n", m.role.to_uppercase(), content.join("\n")));
        export.push_str(SEPARATOR);
        export.push('\n');
    }
    export
}

/// Parses a rendered transcript. Only `user` and `assistant` blocks are
/// accepted, and at least one block must be present.
pub fn parse(text: &str) -> Result<Transcript, TranscriptError> {
    let mut lines = text.lines();
    let mut title = DEFAULT_IMPORT_TITLE.to_string();

    for line in lines.by_ref() {
        if line == SEPARATOR {
            break;
        }
        if let Some(t) = line.strip_prefix("Conversation: ") {
            if !t.trim().is_empty() {
                title = t.trim().to_string();
            }
        }
    }

    let mut entries = Vec::new();
    let mut current: Option<TranscriptEntry> = None;

    for line in lines {
        if line == SEPARATOR {
            if let Some(entry) = current.take() {
                entries.push(finish(entry));
            }
            continue;
        }
        match current.as_mut() {
            Some(entry) => {
                entry.content.push('\n');
                entry.content.push_str(unescape_line(line));
            }
            None => {
                // stray text outside a message block is dropped
                current = parse_header(line)?;
            }
        }
    }
    // tolerate a missing trailing separator
    if let Some(entry) = current {
        entries.push(finish(entry));
    }

    if entries.is_empty() {
        return Err(TranscriptError::Empty);
    }
    Ok(Transcript { title, entries })
}

fn escape_line(line: &str) -> String {
    if line == SEPARATOR || line.starts_with(ESCAPE) {
        format!("{}{}", ESCAPE, line)
    } else {
        line.to_string()
    }
}

fn unescape_line(line: &str) -> &str {
    line.strip_prefix(ESCAPE).unwrap_or(line)
}

fn parse_header(line: &str) -> Result<Option<TranscriptEntry>, TranscriptError> {
    let Some(rest) = line.strip_prefix('[') else {
        return Ok(None);
    };
    let Some(end) = rest.find("]: ").or_else(|| rest.strip_suffix(']').map(|r| r.len())) else {
        return Ok(None);
    };
    let role = &rest[..end];
    if role.is_empty() || !role.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(None);
    }

    let role = role.to_lowercase();
    if role != ROLE_USER && role != ROLE_ASSISTANT {
        return Err(TranscriptError::UnknownRole(role));
    }
    let content = rest.get(end + 3..).unwrap_or_default();
    Ok(Some(TranscriptEntry {
        role,
        content: unescape_line(content).to_string(),
    }))
}

fn finish(mut entry: TranscriptEntry) -> TranscriptEntry {
    entry.content = entry.content.trim_end().to_string();
    entry
}
