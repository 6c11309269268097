use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::config::Config;
use crate::interview::bundle::PromptBundle;
use crate::interview::session::InterviewSession;
use crate::llm_client::LlmConnector;

/// One live interview. Events for a session are serialized on its mutex.
pub type SharedSession = Arc<Mutex<InterviewSession>>;

/// Live sessions keyed by id. The map lock is held only for lookups,
/// inserts and sweeps, never across a model call.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionStore {
    pub async fn insert(&self, session: InterviewSession) -> SharedSession {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.inner.write().await.insert(id, Arc::clone(&shared));
        shared
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Locks the session for one action and records the activity.
    pub async fn open(&self, id: Uuid) -> Option<OwnedMutexGuard<InterviewSession>> {
        let shared = self.get(id).await?;
        let mut session = shared.lock_owned().await;
        session.touch();
        Some(session)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.inner.write().await.remove(&id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Drops sessions idle for longer than `ttl` as of `now`. A session whose
    /// lock is held is mid-action and is kept. Returns how many were dropped.
    pub async fn sweep_idle(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, shared| match shared.try_lock() {
            Ok(session) => now - session.last_active() <= ttl,
            Err(_) => true,
        });
        before - sessions.len()
    }
}

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Loaded once at startup, read-only afterwards.
    pub bundle: Arc<PromptBundle>,
    /// Validates a credential and hands back a model for the new session.
    pub connector: Arc<dyn LlmConnector>,
    pub sessions: SessionStore,
    pub config: Config,
}
