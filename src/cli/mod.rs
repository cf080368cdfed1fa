pub mod commands;

use anyhow::{anyhow, bail, Context, Result};
use duckdb::Connection;
use std::io::{self, BufRead, Write};
use std::path::Path;
use uuid::Uuid;

use crate::chat::{transcript, ChatService};
use crate::cli::commands::{Commands, ConversationAction};
use crate::config::AppConfig;
use crate::db::{self, service::DbService, DEFAULT_CONVERSATION_TITLE};
use crate::llm;

pub async fn run_cli(command: Commands, config_path: String) -> Result<()> {
    let config = AppConfig::load(&config_path).context("Failed to load config")?;

    match command {
        Commands::Serve => bail!("serve is handled by the server entry point"),
        Commands::Conversation { action } => {
            let conn = db::open(&config.database).context("Failed to open database")?;
            run_conversation_action(&conn, action)
        }
        Commands::Chat { conversation, user } => run_repl(conversation, user, config).await,
    }
}

pub fn run_conversation_action(conn: &Connection, action: ConversationAction) -> Result<()> {
    match action {
        ConversationAction::Create { title, user } => {
            let title = title.unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.to_string());
            let conversation = DbService::insert_conversation(conn, &user, &title)?;
            println!("Created Conversation: {} ({})", conversation.title, conversation.id);
        }
        ConversationAction::List { user, limit } => {
            let conversations = DbService::list_conversations(conn, user.as_deref(), limit, 0)?;
            if conversations.is_empty() {
                println!("No conversations found.");
            } else {
                println!("{:<38} | {:<16} | {:<20} | {}", "ID", "User", "Updated At", "Title");
                println!("{:-<38}-+-{:-<16}-+-{:-<20}-+-{:-<20}", "", "", "", "");
                for c in conversations {
                    println!(
                        "{:<38} | {:<16} | {:<20} | {}",
                        c.id.to_string(),
                        c.user_id,
                        c.updated_at.format("%Y-%m-%d %H:%M:%S"),
                        c.title
                    );
                }
            }
        }
        ConversationAction::Delete { id } => {
            if DbService::get_conversation(conn, id)?.is_none() {
                bail!("Conversation {} not found.", id);
            }
            DbService::delete_conversation(conn, id)?;
            println!("Deleted conversation {}", id);
        }
        ConversationAction::Export { id, path } => {
            let export_path = path.unwrap_or_else(|| format!("conversation_{}.txt", id));
            export_to_file(conn, id, Path::new(&export_path))?;
            println!("Conversation exported successfully to: {}", export_path);
        }
        ConversationAction::Import { path, user } => {
            let conversation_id = import_from_file(conn, Path::new(&path), &user)?;
            println!("Created new conversation: {}", conversation_id);
            println!("Import completed successfully.");
        }
    }
    Ok(())
}

pub fn export_to_file(conn: &Connection, id: Uuid, path: &Path) -> Result<()> {
    let conversation = DbService::get_conversation(conn, id)?
        .ok_or_else(|| anyhow!("Conversation {} not found.", id))?;
    let messages = DbService::all_messages(conn, id)?;

    std::fs::write(path, transcript::render(&conversation, &messages))
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub fn import_from_file(conn: &Connection, path: &Path, user_id: &str) -> Result<Uuid> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = transcript::parse(&content).with_context(|| format!("Failed to import {}", path.display()))?;

    let conversation = DbService::import_transcript(conn, user_id, &parsed.title, &parsed.entries)?;
    Ok(conversation.id)
}

async fn run_repl(conversation_id: Uuid, user_id: String, config: AppConfig) -> Result<()> {
    let pool = db::get_connection(&config.database).context("Failed to open database")?;
    let llm = llm::create_provider(&config.gemini)?;
    let chat = ChatService::new(pool, llm, config.chat.clone());

    // Verify conversation
    let owned = chat.owns(&user_id, conversation_id).map_err(|e| anyhow!("{}", e))?;
    if !owned {
        bail!("Conversation {} not found for user {}.", conversation_id, user_id);
    }

    println!("--- Gemini Terminal Chat ---");
    println!("Connected to Conversation: {}", conversation_id);
    println!("Type /exit to quit.");
    println!("----------------------------");

    let stdin = io::stdin();
    loop {
        print!("\nUser> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let text = input.trim();

        if text.is_empty() {
            continue;
        }
        if text == "/exit" || text == "/quit" {
            break;
        }

        let turn = match chat.prepare(&user_id, conversation_id, text) {
            Ok(turn) => turn,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        print!("Gemini> ");
        io::stdout().flush()?;

        let mut rx = chat.stream(turn);
        while let Some(chunk) = rx.recv().await {
            print!("{}", chunk);
            io::stdout().flush()?;
        }
        println!();
    }
    Ok(())
}
