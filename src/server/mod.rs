//! Service layer and HTTP surface.
//!
//! - [`AppState`]: the cache, memory, router and dispatcher for one process
//! - `handlers`: transport-independent operations over [`SharedState`]
//! - `http`: axum routes mapping requests onto the handlers

mod handlers;
mod http;

pub use handlers::*;
pub use http::{build_router, run, ApiError};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;

use crate::cache::DocumentCache;
use crate::collaborators::{Indexer, LanguageModel};
use crate::config::Config;
use crate::dispatch::TaskDispatcher;
use crate::memory::ConversationMemory;
use crate::router::IntentRouter;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub cache: Arc<DocumentCache>,
    pub memory: Arc<ConversationMemory>,
    pub router: IntentRouter,
    pub dispatcher: TaskDispatcher,
    /// Serializes cache changes with their document-context updates
    pub upload_lock: Mutex<()>,
}

impl AppState {
    /// Wire the core components around the given collaborators.
    pub fn new(config: Config, indexer: Arc<dyn Indexer>, llm: Arc<dyn LanguageModel>) -> Self {
        let timeout = Duration::from_millis(config.request.timeout_ms);

        let cache = Arc::new(DocumentCache::new(
            config.storage.clone(),
            config.limits.max_upload_bytes,
            indexer.clone(),
            timeout,
        ));
        let memory = Arc::new(ConversationMemory::new());
        let router = IntentRouter::new(memory.clone(), llm.clone(), timeout);
        let dispatcher = TaskDispatcher::new(
            cache.clone(),
            memory.clone(),
            indexer,
            llm,
            config.tasks.clone(),
            timeout,
        );

        info!(
            data_dir = %config.storage.data_dir.display(),
            timeout_ms = config.request.timeout_ms,
            "Application state initialized"
        );

        Self {
            config,
            cache,
            memory,
            router,
            dispatcher,
            upload_lock: Mutex::new(()),
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
