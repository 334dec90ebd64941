use crate::extract::MediaDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId, UserId};
use tokio::sync::Mutex;

/// Everything a pending menu needs to run its download later. Keyed by the
/// status message's identity, so button presses never have to recover state
/// from rendered message text.
#[derive(Debug, Clone)]
pub struct Session {
    pub descriptor: MediaDescriptor,
    pub resolved_url: String,
    pub requester: Option<UserId>,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<(ChatId, MessageId), Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, chat: ChatId, message: MessageId, session: Session) {
        self.inner.lock().await.insert((chat, message), session);
    }

    /// Claims the session, removing it: a menu is consumed by the first
    /// button press, and a second press reports it expired.
    pub async fn take(&self, chat: ChatId, message: MessageId) -> Option<Session> {
        self.inner.lock().await.remove(&(chat, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MediaDescriptor;

    fn session() -> Session {
        Session {
            descriptor: MediaDescriptor::optimistic("Media", "https://example.com/x"),
            resolved_url: "https://example.com/x".to_string(),
            requester: Some(UserId(7)),
        }
    }

    #[tokio::test]
    async fn test_take_claims_once() {
        let store = SessionStore::new();
        store.insert(ChatId(1), MessageId(2), session()).await;

        let claimed = store.take(ChatId(1), MessageId(2)).await;
        assert!(claimed.is_some());
        assert_eq!(claimed.unwrap().requester, Some(UserId(7)));

        assert!(store.take(ChatId(1), MessageId(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_per_message() {
        let store = SessionStore::new();
        store.insert(ChatId(1), MessageId(2), session()).await;
        assert!(store.take(ChatId(1), MessageId(3)).await.is_none());
        assert!(store.take(ChatId(2), MessageId(2)).await.is_none());
        assert!(store.take(ChatId(1), MessageId(2)).await.is_some());
    }
}
