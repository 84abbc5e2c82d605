//! Application state: the provider and the in-memory session registry.
//!
//! This module owns:
//!   - the challenge provider (OpenAI when configured, otherwise an unavailable stub)
//!   - every live session, keyed by id
//!
//! Sessions are independent. Nothing here is persisted. Sessions nobody has
//! touched for a while are swept, unless a WebSocket is still attached.

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{watch, Mutex, MutexGuard, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::load_agent_config_from_env;
use crate::openai::OpenAI;
use crate::providers::{ChallengeProvider, UnavailableProvider};
use crate::session::{ChallengeSession, SessionView};

/// One session plus a channel that carries its latest snapshot.
pub struct SessionHandle {
    id: String,
    inner: Mutex<ChallengeSession>,
    updates: watch::Sender<SessionView>,
    touched: std::sync::Mutex<Instant>,
}

impl SessionHandle {
    pub fn new(id: String) -> Self {
        let session = ChallengeSession::new(id.clone());
        let (updates, _) = watch::channel(session.snapshot());
        Self { id, inner: Mutex::new(session), updates, touched: std::sync::Mutex::new(Instant::now()) }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Every read or transition goes through here, so it also marks the session as used.
    pub async fn lock(&self) -> MutexGuard<'_, ChallengeSession> {
        self.touch();
        self.inner.lock().await
    }

    fn touch(&self) {
        if let Ok(mut t) = self.touched.lock() {
            *t = Instant::now();
        }
    }

    pub fn idle_for(&self) -> Duration {
        self.touched.lock().map(|t| t.elapsed()).unwrap_or_default()
    }

    /// True while a WebSocket writer is streaming this session.
    pub fn has_subscribers(&self) -> bool {
        self.updates.receiver_count() > 0
    }

    /// Broadcast the current state of `session` to subscribers and return it.
    pub fn publish(&self, session: &ChallengeSession) -> SessionView {
        let view = session.snapshot();
        self.updates.send_replace(view.clone());
        view
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.updates.subscribe()
    }

    pub async fn snapshot(&self) -> SessionView {
        self.lock().await.snapshot()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,
    pub provider: Arc<dyn ChallengeProvider>,
}

impl AppState {
    /// Build state from env: load prompt overrides, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let prompts = load_agent_config_from_env()
            .map(|c| c.prompts)
            .unwrap_or_default();

        let provider: Arc<dyn ChallengeProvider> = match OpenAI::from_env(prompts) {
            Some(oa) => {
                info!(target: "codecrafter", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
                Arc::new(oa)
            }
            None => {
                warn!(target: "codecrafter", "OpenAI disabled (no OPENAI_API_KEY). Every AI operation will report an error.");
                Arc::new(UnavailableProvider)
            }
        };
        Self::with_provider(provider)
    }

    pub fn with_provider(provider: Arc<dyn ChallengeProvider>) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), provider }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn create_session(&self) -> Arc<SessionHandle> {
        let id = Uuid::new_v4().to_string();
        let handle = Arc::new(SessionHandle::new(id.clone()));
        let live = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id.clone(), handle.clone());
            sessions.len()
        };
        info!(target: "session", %id, live, "Session created");
        handle
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_session(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(id).cloned()
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(target: "session", %id, "Session removed");
        }
        removed
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many were removed.
    #[instrument(level = "debug", skip(self))]
    pub async fn sweep_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, h| {
            let keep = h.has_subscribers() || h.idle_for() <= ttl;
            if !keep {
                debug!(target: "session", %id, idle = ?h.idle_for(), "Session expired");
            }
            keep
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(target: "session", removed, live = sessions.len(), "Swept idle sessions");
        }
        removed
    }

    /// Sweep forever at a fraction of `ttl`. Spawned once by `main`.
    pub async fn run_idle_sweep(self: Arc<Self>, ttl: Duration) {
        let period = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
        let mut tick = tokio::time::interval(period);
        loop {
            tick.tick().await;
            self.sweep_idle(ttl).await;
        }
    }
}

/// Idle lifetime of a session, from SESSION_IDLE_TTL_SECS (default 30 minutes).
pub fn session_ttl_from_env() -> Duration {
    let secs = std::env::var("SESSION_IDLE_TTL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|s| *s > 0)
        .unwrap_or(30 * 60);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_round_trip() {
        let state = AppState::with_provider(Arc::new(UnavailableProvider));
        let h = state.create_session().await;
        assert!(state.get_session(h.id()).await.is_some());
        assert!(state.remove_session(h.id()).await);
        assert!(!state.remove_session(h.id()).await);
        assert!(state.get_session(h.id()).await.is_none());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let state = AppState::with_provider(Arc::new(UnavailableProvider));
        let a = state.create_session().await;
        let b = state.create_session().await;
        {
            let mut s = a.lock().await;
            s.set_topic("Graphs");
            a.publish(&s);
        }
        assert_eq!(a.snapshot().await.config.topic.as_deref(), Some("Graphs"));
        assert_eq!(b.snapshot().await.config.topic, None);
        assert_eq!(a.subscribe().borrow().config.topic.as_deref(), Some("Graphs"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_swept() {
        let state = AppState::with_provider(Arc::new(UnavailableProvider));
        let stale = state.create_session().await;
        let active = state.create_session().await;
        let streamed = state.create_session().await;
        let _rx = streamed.subscribe();

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        active.snapshot().await;
        tokio::time::advance(Duration::from_secs(15 * 60)).await;

        assert_eq!(state.sweep_idle(Duration::from_secs(30 * 60)).await, 1);
        assert!(state.get_session(stale.id()).await.is_none());
        assert!(state.get_session(active.id()).await.is_some());
        assert!(state.get_session(streamed.id()).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_expires_abandoned_sessions() {
        let state = Arc::new(AppState::with_provider(Arc::new(UnavailableProvider)));
        let h = state.create_session().await;
        tokio::spawn(state.clone().run_idle_sweep(Duration::from_secs(60)));

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(state.get_session(h.id()).await.is_none());
    }
}
