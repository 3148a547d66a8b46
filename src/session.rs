use uuid::Uuid;

use crate::error::ChatResult;
use crate::llm::{Content, GenerativeBackend, Part};

/// Multi-turn exchange with the model.
///
/// The REST endpoint is stateless, so the session keeps the accumulated turns and replays them
/// on every send. A failed send leaves the history untouched.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of completed exchanges
    pub fn turn_count(&self) -> usize {
        self.history.len() / 2
    }

    /// Send one user turn and record the exchange on success.
    pub async fn send(&mut self, backend: &dyn GenerativeBackend, parts: Vec<Part>) -> ChatResult<String> {
        let user_turn = Content::user(parts);

        let mut contents = Vec::with_capacity(self.history.len() + 1);
        contents.extend(self.history.iter().cloned());
        contents.push(user_turn.clone());

        let reply = backend.generate_content(&contents).await?;

        self.history.push(user_turn);
        self.history.push(Content::model(reply.clone()));
        Ok(reply)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns at most one active session per conversation.
///
/// States are absent and active: the first send creates a session, a reset discards it.
#[derive(Debug, Default)]
pub struct SessionManager {
    current_session: Option<ChatSession>,
}

impl SessionManager {
    pub fn is_active(&self) -> bool {
        self.current_session.is_some()
    }

    /// Get current session
    pub fn current(&self) -> Option<&ChatSession> {
        self.current_session.as_ref()
    }

    /// Return the active session, starting one with an empty history if there is none.
    pub fn ensure_active(&mut self) -> &mut ChatSession {
        self.current_session.get_or_insert_with(|| {
            let session = ChatSession::new();
            tracing::info!(session = %session.id(), "started chat session");
            session
        })
    }

    /// Drop the active session, if any.
    ///
    /// The Gemini API keeps no server-side chat state, so there is nothing to close remotely;
    /// discarding the local history ends the session.
    pub fn reset(&mut self) -> Option<ChatSession> {
        let discarded = self.current_session.take();
        if let Some(session) = &discarded {
            tracing::debug!(
                session = %session.id(),
                turns = session.turn_count(),
                "discarded chat session locally"
            );
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::testing::ScriptedBackend;

    #[test]
    fn starts_absent_and_activates_once() {
        let mut sessions = SessionManager::default();
        assert!(!sessions.is_active());

        let first = sessions.ensure_active().id();
        let second = sessions.ensure_active().id();
        assert_eq!(first, second);
        assert!(sessions.is_active());
    }

    #[test]
    fn reset_forces_a_new_handle() {
        let mut sessions = SessionManager::default();
        let first = sessions.ensure_active().id();

        let discarded = sessions.reset().unwrap();
        assert_eq!(discarded.id(), first);
        assert!(!sessions.is_active());
        assert!(sessions.reset().is_none());

        let second = sessions.ensure_active().id();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn send_replays_history() {
        let backend = ScriptedBackend::new().with_replies(vec![Ok("one".to_string()), Ok("two".to_string())]);
        let mut session = ChatSession::new();

        assert_eq!(session.send(&backend, vec![Part::text("first")]).await.unwrap(), "one");
        assert_eq!(session.send(&backend, vec![Part::text("second")]).await.unwrap(), "two");
        assert_eq!(session.turn_count(), 2);

        let sent = backend.sent();
        assert_eq!(sent[0], vec![Content::user(vec![Part::text("first")])]);
        assert_eq!(
            sent[1],
            vec![
                Content::user(vec![Part::text("first")]),
                Content::model("one"),
                Content::user(vec![Part::text("second")]),
            ]
        );
    }

    #[tokio::test]
    async fn failed_send_keeps_history_unchanged() {
        let backend = ScriptedBackend::new().with_replies(vec![
            Err(ChatError::Api {
                status: 500,
                message: "INTERNAL".to_string(),
            }),
            Ok("recovered".to_string()),
        ]);
        let mut session = ChatSession::new();

        assert!(session.send(&backend, vec![Part::text("hello")]).await.is_err());
        assert_eq!(session.turn_count(), 0);

        session.send(&backend, vec![Part::text("again")]).await.unwrap();
        assert_eq!(backend.sent()[1], vec![Content::user(vec![Part::text("again")])]);
    }
}
