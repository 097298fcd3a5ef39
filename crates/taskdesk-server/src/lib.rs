pub mod auth;
pub mod config;
mod routes;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use taskdesk_db::Database;
use taskdesk_service::{AccountService, TaskManager};
use taskdesk_store::ObjectStore;
use tokio::net::TcpListener;

pub use routes::{build_router, AppState, InnerAppState};

use auth::TokenIssuer;

/// Wire the backends into shared handler state.
pub fn build_state(
    db: Arc<dyn Database>,
    store: Arc<dyn ObjectStore>,
    tokens: TokenIssuer,
    public_url: &str,
    max_body_bytes: usize,
) -> AppState {
    Arc::new(InnerAppState {
        tasks: TaskManager::new(db.clone(), store, public_url),
        accounts: AccountService::new(db.clone()),
        db,
        tokens,
        max_body_bytes,
    })
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
