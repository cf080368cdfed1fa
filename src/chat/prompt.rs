use crate::db::models::ChatMessage;

/// Flattens the recent history plus the new user turn into the single text
/// prompt sent to the model, one `ROLE: content` line per message.
pub fn build_prompt(history: &[ChatMessage], user_message: &str) -> String {
    let mut parts: Vec<String> = history
        .iter()
        .map(|m| format!("{}: {}", m.role.to_uppercase(), m.content))
        .collect();
    parts.push(format!("USER: {}", user_message));
    parts.join("\n")
}
