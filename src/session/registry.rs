use super::session::Session;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Where a tracked session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created remotely, no channel streaming yet
    Pending,
    Streaming,
    /// Channel released, remote close in flight
    Closing,
}

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session: Session,
    pub phase: SessionPhase,
    pub registered_at: DateTime<Utc>,
}

/// Tracks active and pending sessions (task_id → entry)
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: Session) {
        debug!("Registering session {}", session.task_id);
        let entry = SessionEntry {
            phase: SessionPhase::Pending,
            registered_at: Utc::now(),
            session,
        };
        let mut sessions = self.sessions.write().await;
        sessions.insert(entry.session.task_id.clone(), entry);
    }

    /// Returns false when the task id is not tracked
    pub async fn set_phase(&self, task_id: &str, phase: SessionPhase) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(task_id) {
            Some(entry) => {
                entry.phase = phase;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, task_id: &str) -> Option<SessionEntry> {
        let sessions = self.sessions.read().await;
        sessions.get(task_id).cloned()
    }

    pub async fn remove(&self, task_id: &str) -> Option<SessionEntry> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(task_id);
        if removed.is_some() {
            debug!("Session {} removed from registry", task_id);
        }
        removed
    }

    pub async fn active(&self) -> Vec<SessionEntry> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
