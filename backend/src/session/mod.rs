//! Payout sessions.
//!
//! Creating a payout and uploading its recipient list are two requests. The
//! first fixes the tenant, network, safe and token; the second compiles
//! against them. [`SessionStore`] holds what lies in between, keyed by a
//! short random id, and forgets it after a time-to-live.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::TokenDescriptor;

/// Length of a session id.
pub const SESSION_ID_LEN: usize = 8;

/// Everything a batch compilation needs besides the recipient list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutSession {
    pub id: String,
    pub tenant: String,
    pub chain_id: u64,
    pub safe_address: String,
    pub token: TokenDescriptor,
    pub created_at: DateTime<Utc>,
}

/// A session removed from the store for exclusive use.
///
/// Hand it back with [`SessionStore::restore`] to make it usable again; it
/// keeps its original expiry.
#[derive(Debug)]
pub struct ClaimedSession {
    pub session: PayoutSession,
    opened: Instant,
}

/// Caller-owned session map with expiry
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, (Instant, PayoutSession)>>,
}

fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()[..SESSION_ID_LEN].to_string()
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (Instant, PayoutSession)>> {
        // A panic while holding the lock leaves the map itself intact
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a session and return it.
    pub fn create(
        &self,
        tenant: &str,
        chain_id: u64,
        safe_address: &str,
        token: TokenDescriptor,
    ) -> PayoutSession {
        let mut sessions = self.lock();
        let mut id = new_session_id();
        while sessions.contains_key(&id) {
            id = new_session_id();
        }

        let session = PayoutSession {
            id: id.clone(),
            tenant: tenant.to_string(),
            chain_id,
            safe_address: safe_address.to_string(),
            token,
            created_at: Utc::now(),
        };
        sessions.insert(id, (Instant::now(), session.clone()));
        session
    }

    fn is_live(&self, opened: &Instant) -> bool {
        opened.elapsed() < self.ttl
    }

    /// Live session by id.
    pub fn get(&self, id: &str) -> Option<PayoutSession> {
        let mut sessions = self.lock();
        match sessions.get(id) {
            Some((opened, session)) if self.is_live(opened) => Some(session.clone()),
            Some(_) => {
                sessions.remove(id);
                None
            }
            None => None,
        }
    }

    /// Remove a session, returning it if it was still live.
    pub fn take(&self, id: &str) -> Option<PayoutSession> {
        let (opened, session) = self.lock().remove(id)?;
        self.is_live(&opened).then_some(session)
    }

    /// Remove a live session so no other caller can use it concurrently.
    pub fn claim(&self, id: &str) -> Option<ClaimedSession> {
        let (opened, session) = self.lock().remove(id)?;
        self.is_live(&opened).then_some(ClaimedSession { session, opened })
    }

    /// Return a claimed session to the store.
    pub fn restore(&self, claimed: ClaimedSession) {
        if self.is_live(&claimed.opened) {
            self.lock()
                .insert(claimed.session.id.clone(), (claimed.opened, claimed.session));
        }
    }

    /// Drop every expired session. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, (opened, _)| opened.elapsed() < self.ttl);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
