use crate::error::AppError;
use crate::types::{CallSession, SessionStatus, Turn};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as SessionLock;
use tracing::{debug, info};

/// Shared handle on one call. Holding the lock is what serializes webhook
/// deliveries for the same call.
pub type SessionHandle = Arc<SessionLock<CallSession>>;

struct Entry {
    session: SessionHandle,
    last_activity: Instant,
}

/// Process-wide table of active calls keyed by call id.
pub struct SessionStore {
    // call id => session; the map lock is never held across an await
    sessions: Mutex<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // a panic while holding the map lock leaves the map itself consistent
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the session for `call_id`, creating it on first sight. The flag
    /// is false when a redelivered call-start event found an existing session.
    pub fn create(&self, call_id: &str, business_id: &str, caller: &str) -> (SessionHandle, bool) {
        let mut sessions = self.table();
        if let Some(entry) = sessions.get_mut(call_id) {
            entry.last_activity = Instant::now();
            debug!(call_id=%call_id, "call already has a session");
            return (entry.session.clone(), false);
        }
        let session = Arc::new(SessionLock::new(CallSession::new(
            call_id,
            business_id,
            caller,
        )));
        sessions.insert(
            call_id.to_string(),
            Entry {
                session: session.clone(),
                last_activity: Instant::now(),
            },
        );
        info!(call_id=%call_id, business_id=%business_id, "created call session");
        (session, true)
    }

    pub fn get(&self, call_id: &str) -> Result<SessionHandle, AppError> {
        self.table()
            .get(call_id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| AppError::SessionNotFound(call_id.to_string()))
    }

    pub async fn append_turn(&self, call_id: &str, turn: Turn) -> Result<(), AppError> {
        let handle = self.get(call_id)?;
        let mut session = handle.lock().await;
        if !session.is_active() {
            return Err(AppError::SessionNotFound(call_id.to_string()));
        }
        session.append_turn(turn);
        drop(session);
        self.touch(call_id);
        Ok(())
    }

    pub fn touch(&self, call_id: &str) {
        if let Some(entry) = self.table().get_mut(call_id) {
            entry.last_activity = Instant::now();
        }
    }

    /// Drops the call from the table. Callers mark the session `Terminated`
    /// themselves while they still hold its lock.
    pub fn terminate(&self, call_id: &str) -> Option<SessionHandle> {
        let removed = self.table().remove(call_id).map(|entry| entry.session);
        if removed.is_some() {
            info!(call_id=%call_id, "removed call session");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes calls with no webhook activity for longer than the idle
    /// timeout; abandoned calls never send a final event.
    pub fn expire_idle(&self) -> usize {
        let timeout = self.idle_timeout;
        let expired: Vec<(String, SessionHandle)> = {
            let mut sessions = self.table();
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, entry)| entry.last_activity.elapsed() > timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry.session)))
                .collect()
        };
        for (call_id, handle) in &expired {
            // a turn still in flight keeps the lock; it notices the removal itself
            if let Ok(mut session) = handle.try_lock() {
                session.status = SessionStatus::Terminated;
            }
            info!(call_id=%call_id, "expired idle call session");
        }
        expired.len()
    }
}
