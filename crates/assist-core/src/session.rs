//! Session Management
//!
//! Conversation history keyed by conversation ID.
//!
//! Each session sits behind its own async mutex, so turns on the same
//! conversation run one at a time while unrelated conversations proceed in
//! parallel. The index mapping IDs to sessions is only locked long enough to
//! look up or insert an entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::message::Message;

/// Unique conversation identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Use the caller's ID verbatim when one was supplied, otherwise mint a
    /// fresh one. Blank IDs count as not supplied.
    pub fn resolve(supplied: Option<&str>) -> Self {
        supplied
            .filter(|id| !id.trim().is_empty())
            .map_or_else(Self::new, Self::from_string)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// History of one conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: ConversationId,

    messages: Vec<Message>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append one completed exchange and trim to `2 × max_history` messages
    ///
    /// Oldest messages go first. Exchanges are always appended in pairs, so
    /// dropping an even count keeps user/assistant alternation intact.
    pub fn record_exchange(&mut self, user: Message, assistant: Message, max_history: usize) {
        self.messages.push(user);
        self.messages.push(assistant);

        let limit = max_history.saturating_mul(2);
        if self.messages.len() > limit {
            let excess = self.messages.len() - limit;
            self.messages.drain(..excess);
        }

        self.touch();
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Exclusive access to one session for the duration of a turn
pub type SessionGuard = OwnedMutexGuard<ConversationSession>;

/// Concurrency-safe map from conversation ID to session
#[derive(Default)]
pub struct ConversationStore {
    sessions: Mutex<HashMap<ConversationId, Arc<AsyncMutex<ConversationSession>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &ConversationId) -> Arc<AsyncMutex<ConversationSession>> {
        let mut sessions = self.sessions.lock();
        sessions
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(conversation_id = %id, "Creating conversation session");
                Arc::new(AsyncMutex::new(ConversationSession::new(id.clone())))
            })
            .clone()
    }

    /// Get or create the session and wait for exclusive access to it
    ///
    /// Hold the guard for the whole turn; it releases on drop.
    pub async fn lock(&self, id: &ConversationId) -> SessionGuard {
        self.entry(id).lock_owned().await
    }

    /// Release a turn's guard, forgetting the session if it never recorded
    /// an exchange and nobody else is waiting on it
    pub fn release(&self, guard: SessionGuard) {
        if !guard.is_empty() {
            return;
        }
        let id = guard.id.clone();
        drop(guard);

        let mut sessions = self.sessions.lock();
        let unused = sessions.get(&id).is_some_and(|session| {
            Arc::strong_count(session) == 1 && session.try_lock().is_ok_and(|s| s.is_empty())
        });
        if unused {
            sessions.remove(&id);
            tracing::debug!(conversation_id = %id, "Dropped empty conversation session");
        }
    }

    /// Copy of a session's history, if the session exists
    pub async fn history(&self, id: &ConversationId) -> Option<Vec<Message>> {
        let session = self.sessions.lock().get(id).cloned()?;
        let guard = session.lock().await;
        Some(guard.messages().to_vec())
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Number of tracked conversations
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Drop sessions idle for longer than `max_idle`
    ///
    /// Sessions locked by a turn, or handed out to a caller still waiting for
    /// the lock, are never evicted. Returns how many sessions were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let Some(cutoff) = TimeDelta::from_std(max_idle)
            .ok()
            .and_then(|idle| Utc::now().checked_sub_signed(idle))
        else {
            return 0;
        };
        let mut sessions = self.sessions.lock();
        let before = sessions.len();

        sessions.retain(|_, session| {
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(guard) => guard.updated_at >= cutoff,
                Err(_) => true,
            }
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Evicted idle conversations");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    fn exchange(session: &mut ConversationSession, n: usize, max_history: usize) {
        session.record_exchange(
            Message::user(format!("u{n}")),
            Message::assistant(format!("a{n}")),
            max_history,
        );
    }

    #[test]
    fn test_resolve_id() {
        assert_eq!(ConversationId::resolve(Some("kitchen-1")).as_str(), "kitchen-1");
        let fresh = ConversationId::resolve(None);
        assert!(Uuid::parse_str(fresh.as_str()).is_ok());
        assert_ne!(ConversationId::resolve(Some("  ")).as_str(), "  ");
    }

    #[test]
    fn test_resolve_keeps_supplied_id_verbatim() {
        assert_eq!(ConversationId::resolve(Some("abc ")).as_str(), "abc ");
    }

    #[test]
    fn test_history_bounded_and_oldest_dropped() {
        let mut session = ConversationSession::new(ConversationId::new());
        for n in 0..7 {
            exchange(&mut session, n, 3);
            assert!(session.len() <= 6);
        }

        let contents: Vec<_> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["u4", "a4", "u5", "a5", "u6", "a6"]);
        assert_eq!(session.messages()[0].role, Role::User);
    }

    #[test]
    fn test_shrinking_max_history_trims_on_next_turn() {
        let mut session = ConversationSession::new(ConversationId::new());
        for n in 0..5 {
            exchange(&mut session, n, 10);
        }
        assert_eq!(session.len(), 10);

        exchange(&mut session, 5, 2);
        let contents: Vec<_> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["u4", "a4", "u5", "a5"]);
    }

    #[tokio::test]
    async fn test_lock_creates_lazily() {
        let store = ConversationStore::new();
        let id = ConversationId::from_string("abc");
        assert!(!store.contains(&id));
        assert!(store.history(&id).await.is_none());

        {
            let mut guard = store.lock(&id).await;
            guard.record_exchange(Message::user("hi"), Message::assistant("hello"), 10);
        }

        assert!(store.contains(&id));
        assert_eq!(store.history(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_same_id_is_serialized() {
        let store = Arc::new(ConversationStore::new());
        let id = ConversationId::from_string("shared");

        let guard = store.lock(&id).await;

        let waiter = {
            let store = store.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let mut guard = store.lock(&id).await;
                guard.record_exchange(Message::user("second"), Message::assistant("ok"), 10);
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(store.history(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_distinct_ids_do_not_block() {
        let store = ConversationStore::new();
        let _a = store.lock(&ConversationId::from_string("a")).await;
        let _b = store.lock(&ConversationId::from_string("b")).await;
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_evict_idle_skips_locked_sessions() {
        let store = ConversationStore::new();
        let idle = ConversationId::from_string("idle");
        let busy = ConversationId::from_string("busy");

        drop(store.lock(&idle).await);
        let _busy_guard = store.lock(&busy).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(store.evict_idle(Duration::from_secs(3600)), 0);

        let evicted = store.evict_idle(Duration::from_millis(5));
        assert_eq!(evicted, 1);
        assert!(!store.contains(&idle));
        assert!(store.contains(&busy));
    }

    #[tokio::test]
    async fn test_evict_idle_skips_sessions_about_to_be_locked() {
        let store = ConversationStore::new();
        let id = ConversationId::from_string("pending");

        drop(store.lock(&id).await);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Handle taken but lock not yet acquired, as inside `lock()`.
        let pending = store.entry(&id);
        assert_eq!(store.evict_idle(Duration::from_millis(5)), 0);

        let mut guard = pending.lock_owned().await;
        guard.record_exchange(Message::user("u1"), Message::assistant("a1"), 10);
        drop(guard);

        assert_eq!(store.history(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_release_forgets_unused_session() {
        let store = ConversationStore::new();
        let id = ConversationId::from_string("failed-first-turn");

        let guard = store.lock(&id).await;
        store.release(guard);

        assert!(!store.contains(&id));
        assert!(store.history(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_release_keeps_session_with_history() {
        let store = ConversationStore::new();
        let id = ConversationId::from_string("kept");

        let mut guard = store.lock(&id).await;
        guard.record_exchange(Message::user("hi"), Message::assistant("hello"), 10);
        store.release(guard);

        let guard = store.lock(&id).await;
        store.release(guard);
        assert_eq!(store.history(&id).await.unwrap().len(), 2);
    }
}
