use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "geminichat", version, about = "Gemini Chatbot Backend", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP, SSE and WebSocket server
    Serve,

    /// Chat with Gemini from the terminal inside an existing conversation
    Chat {
        /// The UUID of the conversation to continue
        #[arg(long)]
        conversation: Uuid,
        /// The user id that owns the conversation
        #[arg(short, long, default_value = "local")]
        user: String,
    },

    /// Manage stored conversations
    Conversation {
        #[command(subcommand)]
        action: ConversationAction,
    },
}

#[derive(Subcommand)]
pub enum ConversationAction {
    /// Create a new conversation
    Create {
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long, default_value = "local")]
        user: String,
    },

    /// List conversations, optionally for one user
    List {
        #[arg(short, long)]
        user: Option<String>,
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Delete a conversation and its messages
    Delete {
        id: Uuid,
    },

    /// Export a conversation to a .txt transcript
    Export {
        /// The UUID of the conversation to export
        id: Uuid,
        /// The path to the output file (optional)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Import a conversation from a .txt transcript
    Import {
        /// The path to the .txt file to import
        #[arg(short, long)]
        path: String,
        #[arg(short, long, default_value = "local")]
        user: String,
    },
}
