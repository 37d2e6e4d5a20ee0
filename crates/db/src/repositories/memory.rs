use std::collections::HashMap;

use tokio::sync::RwLock;

use slotwise_core::{ConversationSession, SessionStore, SessionStoreError};

/// Volatile [`SessionStore`] for tests and single-process deployments.
/// Provides the same read-your-own-write behavior as the SQL store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, ConversationSession>>,
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(
        &self,
        session_id: &str,
    ) -> Result<Option<ConversationSession>, SessionStoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn save(&self, session: &ConversationSession) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.session_id().to_string(), session.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }
}
