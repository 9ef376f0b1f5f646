use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatgate", version, about = "Chat storage, rate limiting and inference gateway proxy", long_about = None)]
pub struct Cli {
    /// Defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Inspect stored chat sessions through the configured storage backend
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// List a user's sessions
    List {
        /// Storage user id; omit for the anonymous user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Export a session to a .txt transcript
    Export {
        /// The id of the session to export
        id: String,
        #[arg(short, long)]
        user: Option<String>,
        /// The path to the output file (optional)
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Delete every session and preference of a user
    Clear {
        #[arg(short, long)]
        user: Option<String>,
    },
}
