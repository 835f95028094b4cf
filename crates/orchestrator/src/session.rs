//! Session state: per-caller episodic memory and active context.

use secondbrain_common::now_millis;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

struct SessionState {
    last_activity_at: u64,
    /// Ring buffer of recent turns, oldest first.
    episodic_memory: VecDeque<String>,
    active_context: HashMap<String, String>,
}

/// State for a single user interaction session.
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: u64,
    max_episodic: usize,
    state: RwLock<SessionState>,
}

impl Session {
    fn new(id: String, user_id: String, max_episodic: usize) -> Self {
        let now = now_millis();
        Self {
            id,
            user_id,
            created_at: now,
            max_episodic,
            state: RwLock::new(SessionState {
                last_activity_at: now,
                episodic_memory: VecDeque::new(),
                active_context: HashMap::new(),
            }),
        }
    }

    /// Append a turn to episodic memory, evicting from the head past the
    /// cap.
    pub async fn add_episodic_memory(&self, entry: impl Into<String>) {
        let mut state = self.state.write().await;
        state.episodic_memory.push_back(entry.into());
        while state.episodic_memory.len() > self.max_episodic {
            state.episodic_memory.pop_front();
        }
        state.last_activity_at = now_millis();
    }

    /// A copy of the episodic memory, oldest first.
    pub async fn episodic_snapshot(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .episodic_memory
            .iter()
            .cloned()
            .collect()
    }

    pub async fn set_context(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut state = self.state.write().await;
        state.active_context.insert(key.into(), value.into());
        state.last_activity_at = now_millis();
    }

    pub async fn context_snapshot(&self) -> HashMap<String, String> {
        self.state.read().await.active_context.clone()
    }

    pub async fn last_activity_at(&self) -> u64 {
        self.state.read().await.last_activity_at
    }
}

/// Session lifecycle: lazy creation, lookup, explicit delete, and an
/// age-based sweep.
pub struct SessionManager {
    max_episodic: usize,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(max_episodic: usize) -> Self {
        Self {
            max_episodic,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a session, creating it on first sight of the id.
    pub async fn get_or_create(&self, session_id: &str, user_id: &str) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id = %session_id, "creating session");
            Arc::new(Session::new(
                session_id.to_string(),
                user_id.to_string(),
                self.max_episodic,
            ))
        }))
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn delete(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn list(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Remove sessions idle for longer than `max_age`; returns how many
    /// were evicted.
    pub async fn cleanup_expired(&self, max_age: Duration) -> usize {
        let cutoff = now_millis().saturating_sub(max_age.as_millis() as u64);

        let ids = self.list().await;
        let mut expired = Vec::new();
        for id in ids {
            if let Some(session) = self.get(&id).await {
                if session.last_activity_at().await < cutoff {
                    expired.push(id);
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for id in &expired {
            if sessions.remove(id).is_some() {
                removed += 1;
            }
        }
        removed
    }
}
