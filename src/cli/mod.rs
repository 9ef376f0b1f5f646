pub mod commands;

use tracing::info;

use crate::cli::commands::SessionAction;
use crate::config::AppConfig;
use crate::models::CreatedAt;
use crate::storage::{StorageError, StorageServiceFactory};

pub async fn run_sessions(action: SessionAction, config: &AppConfig) -> Result<(), StorageError> {
    let factory = StorageServiceFactory::from_config(config)?;
    let open = |user: Option<String>| factory.create_service(&config.storage_options(user));

    match action {
        SessionAction::List { user } => {
            let storage = open(user);
            let sessions = storage.get_chat_sessions().await?;
            if sessions.is_empty() {
                println!("No sessions found.");
            } else {
                println!("{:<38} | {:<25} | {:>8} | {}", "ID", "Created At", "Messages", "Title");
                println!("{:-<38}-+-{:-<25}-+-{:-<8}-+-{:-<20}", "", "", "", "");
                for s in sessions {
                    let created = s
                        .created_at
                        .as_ref()
                        .and_then(CreatedAt::to_datetime)
                        .map(|c| c.to_rfc3339())
                        .unwrap_or_default();
                    println!("{:<38} | {:<25} | {:>8} | {}", s.id, created, s.messages.len(), s.title);
                }
            }
            storage.close().await
        }
        SessionAction::Export { id, user, path } => {
            let storage = open(user);
            let sessions = storage.get_chat_sessions().await?;
            let Some(session) = sessions.into_iter().find(|s| s.id == id) else {
                eprintln!("Session {} not found.", id);
                return storage.close().await;
            };

            let export_path = path.unwrap_or_else(|| format!("session_{}.txt", id));
            std::fs::write(&export_path, session.to_transcript())?;
            println!("Session exported successfully to: {}", export_path);
            storage.close().await
        }
        SessionAction::Clear { user } => {
            let storage = open(user.clone());
            storage.clear().await?;
            info!(user_id = ?user, "Cleared stored sessions");
            println!("Cleared storage for {}", user.as_deref().unwrap_or("anonymous user"));
            storage.close().await
        }
    }
}
