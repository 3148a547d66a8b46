//! HTTP boundary: one conversation state per browser client

pub mod error;
pub mod routes;

pub use error::{ApiError, Result};

use axum::{extract::DefaultBodyLimit, Router};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::conversation::{ChatController, ChatState};
use crate::storage::StorageManager;

/// Multipart framing allowance on top of the file itself
const BODY_OVERHEAD: usize = 64 * 1024;

struct ConversationSlot {
    chat: Arc<Mutex<ChatState>>,
    /// Milliseconds since server start at the last lookup
    last_used: AtomicU64,
}

pub struct ServerState {
    pub controller: ChatController,
    pub storage: StorageManager,
    pub max_upload_bytes: usize,
    idle_timeout: Option<Duration>,
    started: Instant,
    conversations: RwLock<HashMap<Uuid, ConversationSlot>>,
}

impl ServerState {
    pub fn new(controller: ChatController, storage: StorageManager, max_upload_bytes: usize) -> Self {
        Self {
            controller,
            storage,
            max_upload_bytes,
            idle_timeout: None,
            started: Instant::now(),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Evict conversations left idle for `timeout`; `None` keeps them until deleted.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    fn clock(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub async fn create_conversation(&self) -> Uuid {
        let id = Uuid::new_v4();
        let slot = ConversationSlot {
            chat: Arc::new(Mutex::new(ChatState::new())),
            last_used: AtomicU64::new(self.clock()),
        };
        self.conversations.write().await.insert(id, slot);
        tracing::info!(conversation = %id, "conversation created");
        id
    }

    pub async fn conversation(&self, id: Uuid) -> Result<Arc<Mutex<ChatState>>> {
        let conversations = self.conversations.read().await;
        let slot = conversations.get(&id).ok_or(ApiError::ConversationNotFound(id))?;
        slot.last_used.store(self.clock(), Ordering::Relaxed);
        Ok(slot.chat.clone())
    }

    pub async fn remove_conversation(&self, id: Uuid) -> Result<()> {
        self.conversations
            .write()
            .await
            .remove(&id)
            .ok_or(ApiError::ConversationNotFound(id))?;
        self.storage.remove_conversation(id).await?;
        tracing::info!(conversation = %id, "conversation removed");
        Ok(())
    }

    /// Drop conversations not looked up for at least `max_idle`, along with their staged files.
    ///
    /// A conversation whose turn is still running is kept.
    pub async fn evict_idle(&self, max_idle: Duration) -> Vec<Uuid> {
        let now = self.clock();
        let limit = max_idle.as_millis() as u64;

        let evicted: Vec<Uuid> = {
            let mut conversations = self.conversations.write().await;
            let expired: Vec<Uuid> = conversations
                .iter()
                .filter(|(_, slot)| {
                    now.saturating_sub(slot.last_used.load(Ordering::Relaxed)) >= limit
                        && slot.chat.try_lock().is_ok()
                })
                .map(|(id, _)| *id)
                .collect();
            for id in &expired {
                conversations.remove(id);
            }
            expired
        };

        for id in &evicted {
            if let Err(e) = self.storage.remove_conversation(*id).await {
                tracing::warn!(conversation = %id, error = %e, "failed to remove staged files");
            }
        }
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "evicted idle conversations");
        }
        evicted
    }
}

pub fn app(state: Arc<ServerState>) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(BODY_OVERHEAD);

    routes::router()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    state.storage.ensure_directories()?;

    if let Some(idle) = state.idle_timeout {
        tokio::spawn(sweep_idle(state.clone(), idle));
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn sweep_idle(state: Arc<ServerState>, idle: Duration) {
    let mut ticker = tokio::time::interval(idle.clamp(Duration::from_secs(1), Duration::from_secs(60)));
    loop {
        ticker.tick().await;
        state.evict_idle(idle).await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
