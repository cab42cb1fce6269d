//! Conversation state and per-session serialization

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, Result};
use crate::types::ConversationTurn;

/// Ordered, append-only history of committed turns
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed turns, oldest first
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> &[ConversationTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a fully formed turn. The only mutator.
    pub fn commit(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }
}

/// Exclusive handle on one session's conversation for the duration of a question
pub type SessionGuard = OwnedMutexGuard<Conversation>;

/// In-memory registry of conversations keyed by session id
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<Conversation>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the session for one question, creating it on first use
    ///
    /// Fails with `SessionBusy` while another question for the same session is in flight.
    pub fn acquire(&self, session_id: &str) -> Result<SessionGuard> {
        let slot = self
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .value()
            .clone();

        slot.try_lock_owned()
            .map_err(|_| Error::SessionBusy(session_id.to_string()))
    }

    /// Snapshot of a session's committed turns
    pub async fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        let slot = match self.sessions.get(session_id) {
            Some(entry) => entry.value().clone(),
            None => return Vec::new(),
        };
        let conversation = slot.lock().await;
        conversation.turns().to_vec()
    }

    /// Known session ids, sorted
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Forget a session. Returns whether it existed.
    ///
    /// Fails with `SessionBusy` while a question for the session is in flight,
    /// so its turn is never committed to a forgotten conversation.
    pub fn clear(&self, session_id: &str) -> Result<bool> {
        let removed = self
            .sessions
            .remove_if(session_id, |_, slot| slot.try_lock().is_ok());
        if removed.is_some() {
            return Ok(true);
        }
        if self.sessions.contains_key(session_id) {
            return Err(Error::SessionBusy(session_id.to_string()));
        }
        Ok(false)
    }
}
