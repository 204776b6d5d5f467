//! In-process session engine.
//!
//! `MemoryEngine` keeps sessions in a map and records every delivered message
//! instead of writing it to a socket. Tests drive it directly: mark sessions
//! reachable or unreachable, make deliveries to a session fail, then inspect
//! what was sent.
use crossbeam_channel::{Receiver, Sender, bounded};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use crate::engine::SessionEngine;
use crate::error::SessionError;
use crate::message::Message;
use crate::result::Result;
use crate::session::SessionId;

#[derive(Default)]
struct MemoryState {
    sessions: BTreeMap<SessionId, bool>,
    failing: HashSet<SessionId>,
    sent: Vec<(SessionId, Message)>,
    attempts: Vec<SessionId>,
    waiters: Vec<(SessionId, Sender<()>)>,
}

/// Engine double that records deliveries in memory.
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<MemoryState>,
}

impl MemoryEngine {
    /// Engine with no sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session_id` without logging it on.
    pub fn add_session(&self, session_id: &SessionId) {
        if let Ok(mut state) = self.state.lock() {
            state.sessions.entry(session_id.clone()).or_insert(false);
        }
    }

    /// Mark `session_id` logged on (registering it if needed) or logged out.
    pub fn set_logged_on(&self, session_id: &SessionId, logged_on: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.sessions.insert(session_id.clone(), logged_on);
            if logged_on {
                state.waiters.retain(|(id, tx)| {
                    if id == session_id {
                        let _ = tx.try_send(());
                        false
                    } else {
                        true
                    }
                });
            }
        }
    }

    /// Make every delivery to `session_id` fail (or succeed again).
    pub fn set_failing(&self, session_id: &SessionId, failing: bool) {
        if let Ok(mut state) = self.state.lock() {
            if failing {
                state.failing.insert(session_id.clone());
            } else {
                state.failing.remove(session_id);
            }
        }
    }

    /// Messages delivered so far, in order.
    pub fn sent(&self) -> Vec<(SessionId, Message)> {
        self.state
            .lock()
            .map(|state| state.sent.clone())
            .unwrap_or_default()
    }

    /// Sessions a delivery was attempted to, successful or not.
    pub fn attempts(&self) -> Vec<SessionId> {
        self.state
            .lock()
            .map(|state| state.attempts.clone())
            .unwrap_or_default()
    }

    /// Forget recorded deliveries and attempts.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.sent.clear();
            state.attempts.clear();
        }
    }
}

impl SessionEngine for MemoryEngine {
    fn session_ids(&self) -> Vec<SessionId> {
        self.state
            .lock()
            .map(|state| state.sessions.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn alive_session_ids(&self) -> Vec<SessionId> {
        self.state
            .lock()
            .map(|state| {
                state
                    .sessions
                    .iter()
                    .filter(|(_, logged_on)| **logged_on)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn send_to_session(&self, msg: Message, session_id: &SessionId) -> Result<()> {
        let mut state = self.state.lock()?;
        state.attempts.push(session_id.clone());
        match state.sessions.get(session_id) {
            None => return Err(SessionError::SessionNotFound(session_id.to_string())),
            Some(false) => return Err(SessionError::NotLoggedOn(session_id.to_string())),
            Some(true) => {}
        }
        if state.failing.contains(session_id) {
            return Err(SessionError::Send(format!("delivery to {} failed", session_id)));
        }
        state.sent.push((session_id.clone(), msg));
        Ok(())
    }

    fn wait_for_logon(&self, session_id: &SessionId) -> Receiver<()> {
        let (tx, rx) = bounded(1);
        if let Ok(mut state) = self.state.lock() {
            if state.sessions.get(session_id).copied().unwrap_or(false) {
                let _ = tx.try_send(());
            } else {
                state.waiters.push((session_id.clone(), tx));
            }
        }
        rx
    }
}
