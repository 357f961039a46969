use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::warn;

use crate::activity::{Action, ActivitySink};
use crate::credentials::CredentialStore;
use crate::messages::{InvalidOffset, Message, MessageLog};
use crate::session::SessionRegistry;

/// The shared chat state behind a concurrency boundary.
///
/// Request handlers on any number of tasks call into one `Arc<ChatService>`.
/// The session set and the message log each sit behind their own mutex, so
/// operations on the same structure are linearizable; critical sections are
/// short and never held across an await. Login and publish touch different
/// structures and are independent; no operation spans both locks.
pub struct ChatService {
    credentials: CredentialStore,
    sessions: Mutex<SessionRegistry>,
    log: Mutex<MessageLog>,
    activity: Arc<dyn ActivitySink>,
}

impl ChatService {
    pub fn new(credentials: CredentialStore, activity: Arc<dyn ActivitySink>) -> Self {
        Self {
            credentials,
            sessions: Mutex::new(SessionRegistry::new()),
            log: Mutex::new(MessageLog::new()),
            activity,
        }
    }

    /// Check credentials and mark the user active.
    ///
    /// Idempotent: logging in an already-active user succeeds without
    /// changing the set. A failed attempt changes nothing and leaves no
    /// activity record.
    pub fn login(&self, username: &str, password: &str) -> bool {
        if !self.credentials.verify(username, password) {
            return false;
        }
        self.sessions.lock().unwrap().login(username);
        self.record_activity(username, Action::Login);
        true
    }

    /// Mark the user logged out. False when the user was not active, in
    /// which case nothing is recorded.
    pub fn logout(&self, username: &str) -> bool {
        let removed = self.sessions.lock().unwrap().logout(username);
        if removed {
            self.record_activity(username, Action::Logout);
        }
        removed
    }

    /// Append a message and return the new total length of the log.
    ///
    /// No recipient existence check: a directed message may name a user who
    /// is not (or never was) logged in and waits in the log for them.
    pub fn publish(&self, sender: &str, body: &str, recipient: Option<String>) -> u64 {
        let (_, total) = self.log.lock().unwrap().append(sender, body, recipient);
        total
    }

    /// Every message at `since_offset` or later, plus the current total.
    pub fn poll(&self, since_offset: u64) -> Result<(Vec<Message>, u64), InvalidOffset> {
        self.log.lock().unwrap().read_from(since_offset)
    }

    /// Sorted snapshot of the currently active usernames.
    pub fn list_active_users(&self) -> Vec<String> {
        self.sessions.lock().unwrap().list_active()
    }

    // A sink failure must not fail the operation that triggered it.
    fn record_activity(&self, username: &str, action: Action) {
        if let Err(e) = self.activity.record(username, action, Utc::now()) {
            warn!("Failed to record {} activity for {}: {}", action, username, e);
        }
    }
}
