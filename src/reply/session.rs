//! Conversation history storage keyed by `{userId}_{sessionId}`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::types::{HistoryMessage, SessionError};

/// TTL-bound store of conversation histories.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Messages recorded for `key`, oldest first. Unknown or expired keys yield an empty history.
    async fn messages(&self, key: &str) -> Result<Vec<HistoryMessage>, SessionError>;

    /// Append `messages` to the history for `key` and refresh its TTL.
    async fn append(&self, key: &str, messages: Vec<HistoryMessage>) -> Result<(), SessionError>;
}

/// Build the storage key for a user's session.
pub fn session_key(user_id: &str, session_id: &str) -> String {
    format!("{user_id}_{session_id}")
}

struct SessionEntry {
    messages: Vec<HistoryMessage>,
    expires_at: Instant,
}

/// In-process [`SessionStore`].
///
/// Expired histories are invisible to readers and are evicted on every write, so the map only
/// holds sessions written within the last TTL.
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl InMemorySessionStore {
    /// Create a store whose histories live for `ttl` after their last write.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every expired history, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        evict_expired(&mut sessions, Instant::now())
    }

    /// Number of histories currently held, expired ones not yet evicted included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no history at all.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn evict_expired(sessions: &mut HashMap<String, SessionEntry>, now: Instant) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| entry.expires_at > now);
    let evicted = before - sessions.len();
    if evicted > 0 {
        tracing::debug!(evicted, remaining = sessions.len(), "Evicted expired sessions");
    }
    evicted
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn messages(&self, key: &str) -> Result<Vec<HistoryMessage>, SessionError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.messages.clone())
            .unwrap_or_default())
    }

    async fn append(&self, key: &str, messages: Vec<HistoryMessage>) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        evict_expired(&mut sessions, now);
        let entry = sessions
            .entry(key.to_string())
            .or_insert_with(|| SessionEntry {
                messages: Vec::new(),
                expires_at: now,
            });
        entry.messages.extend(messages);
        entry.expires_at = now + self.ttl;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_user_and_session() {
        assert_eq!(session_key("alice", "s1"), "alice_s1");
    }

    #[tokio::test]
    async fn appended_messages_are_returned_in_order() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        store
            .append(
                "k",
                vec![HistoryMessage::human("q1"), HistoryMessage::ai("a1")],
            )
            .await
            .unwrap();
        store
            .append("k", vec![HistoryMessage::human("q2")])
            .await
            .unwrap();

        let messages = store.messages("k").await.unwrap();
        assert_eq!(
            messages,
            vec![
                HistoryMessage::human("q1"),
                HistoryMessage::ai("a1"),
                HistoryMessage::human("q2"),
            ]
        );
        assert!(store.messages("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_history_is_forgotten() {
        let store = InMemorySessionStore::new(Duration::from_millis(10));
        store
            .append("k", vec![HistoryMessage::human("old")])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(store.messages("k").await.unwrap().is_empty());
        store
            .append("k", vec![HistoryMessage::human("new")])
            .await
            .unwrap();
        assert_eq!(
            store.messages("k").await.unwrap(),
            vec![HistoryMessage::human("new")]
        );
    }

    #[tokio::test]
    async fn purge_removes_only_expired_sessions() {
        let store = InMemorySessionStore::new(Duration::from_millis(10));
        store
            .append("a", vec![HistoryMessage::human("x")])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        store
            .append("b", vec![HistoryMessage::human("y")])
            .await
            .unwrap();

        assert_eq!(store.purge_expired().await, 0);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.messages("b").await.unwrap().len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn writes_evict_other_expired_sessions() {
        let store = InMemorySessionStore::new(Duration::from_millis(20));
        for user in ["u1", "u2", "u3"] {
            store
                .append(&session_key(user, "s"), vec![HistoryMessage::human("hi")])
                .await
                .unwrap();
        }
        assert_eq!(store.len().await, 3);
        tokio::time::sleep(Duration::from_millis(50)).await;

        store
            .append("u4_s", vec![HistoryMessage::human("hello")])
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.messages("u4_s").await.unwrap().len(), 1);
    }
}
