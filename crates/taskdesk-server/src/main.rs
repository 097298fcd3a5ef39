use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use taskdesk_db::{data_dir, open_database, DbConfig};
use taskdesk_server::auth::{self, TokenIssuer};
use taskdesk_server::config::ServerConfig;
use taskdesk_service::TaskManager;
use taskdesk_store::{create_store, StoreConfig};

#[derive(Parser)]
#[command(name = "taskdesk-server", version, about = "Task management API server")]
struct Cli {
    #[command(flatten)]
    server: ServerConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete stored attachments that no task references.
    /// Run while the server is stopped.
    PruneAttachments,
    /// Drop revoked-token records whose tokens have expired.
    PurgeRevoked,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db = open_database(&DbConfig::from_env()).await?;
    let mut store_config = StoreConfig::from_env();
    store_config
        .data_dir
        .get_or_insert_with(|| data_dir().join("attachments"));
    let store = create_store(&store_config)?;

    match cli.command {
        Some(Commands::PruneAttachments) => {
            let manager = TaskManager::new(db, store, cli.server.public_url());
            let removed = manager.prune_orphaned_attachments().await?;
            info!(count = removed.len(), "pruned orphaned attachments");
        }
        Some(Commands::PurgeRevoked) => {
            let removed = db.purge_expired_revocations(Utc::now()).await?;
            info!(count = removed, "purged expired token revocations");
        }
        None => {
            let config = cli.server;
            let secret = match config.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
                Some(secret) => secret.to_string(),
                None => {
                    warn!("TASKDESK_JWT_SECRET not set; using a random secret, tokens will not survive a restart");
                    auth::generate_secret()
                }
            };
            let tokens = TokenIssuer::new(secret.as_bytes(), config.jwt_ttl_minutes);
            let public_url = config.public_url();
            let state = taskdesk_server::build_state(db, store, tokens, &public_url, config.max_body_bytes);

            let addr = config.addr();
            let listener = TcpListener::bind(addr).await?;
            info!(%addr, %public_url, "taskdesk-server listening");

            taskdesk_server::serve(listener, state).await?;
        }
    }

    Ok(())
}
