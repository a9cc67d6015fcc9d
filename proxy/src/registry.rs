//! Process-wide index of logged-in sessions.
//!
//! Sessions add themselves once their login completes and remove themselves
//! when they close. The registry is how outside code (commands, plugins,
//! tests) finds the session of a given player, e.g. to transfer it.

use crate::session::Session;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Active sessions indexed by player XUID.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session, replacing any previous session of the same player.
    pub fn add(&self, xuid: &str, session: Arc<Session>) {
        if self
            .sessions
            .write()
            .insert(xuid.to_string(), session)
            .is_some()
        {
            debug!("Replaced existing session for {}", xuid);
        }
    }

    /// Removes the session of a player. Returns it if one was registered.
    pub fn remove(&self, xuid: &str) -> Option<Arc<Session>> {
        self.sessions.write().remove(xuid)
    }

    /// Removes the registration of `xuid` only if it still points at
    /// `session`, so a closing session never evicts its replacement.
    pub fn remove_session(&self, xuid: &str, session: &Session) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.get(xuid) {
            Some(registered) if std::ptr::eq(Arc::as_ptr(registered), session) => {
                sessions.remove(xuid);
                true
            }
            _ => false,
        }
    }

    pub fn session(&self, xuid: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(xuid).cloned()
    }

    /// Snapshot of every registered session.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
