use anyhow::Result;

use crate::api::ChatBackend;
use crate::models::{ChatMessage, ConversationSummary};
use crate::services::database::Database;

/// Transcript key used before the server has told us which conversation is current.
pub const FALLBACK_TRANSCRIPT_KEY: &str = "current";

/// Server conversation list plus the cached transcript of the current one.
#[derive(Debug, Clone, Default)]
pub struct ConversationSnapshot {
    pub conversations: Vec<ConversationSummary>,
    pub current: Option<ConversationSummary>,
    pub transcript: Vec<ChatMessage>,
}

pub fn current_of(conversations: &[ConversationSummary]) -> Option<&ConversationSummary> {
    conversations.iter().find(|c| c.is_current)
}

pub fn transcript_key(active: Option<&ConversationSummary>) -> String {
    active
        .map(|c| c.id.clone())
        .unwrap_or_else(|| FALLBACK_TRANSCRIPT_KEY.to_string())
}

/// Reload what the window shows after startup or a server redirect.
///
/// A failing transcript read is logged and yields an empty transcript; only
/// the server call decides success.
pub async fn refresh(backend: &dyn ChatBackend, db: &Database) -> Result<ConversationSnapshot> {
    let conversations = backend.get_conversations().await?;
    let current = current_of(&conversations).cloned();
    let key = transcript_key(current.as_ref());

    let transcript = match db.list_messages(&key).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!("Failed to load transcript for {}: {}", key, e);
            Vec::new()
        }
    };

    tracing::debug!(
        "Loaded {} conversations, current = {:?}, {} cached messages",
        conversations.len(),
        current.as_ref().map(|c| c.id.as_str()),
        transcript.len()
    );

    Ok(ConversationSnapshot {
        conversations,
        current,
        transcript,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::api::{ApiError, QueryReply};
    use crate::models::Sender;

    struct ListBackend(Vec<ConversationSummary>);

    #[async_trait]
    impl ChatBackend for ListBackend {
        fn base_url(&self) -> &str {
            "http://stub"
        }

        async fn send_message(&self, _message: &str) -> Result<String, ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }

        async fn process_input(&self, _query: &str) -> Result<QueryReply, ApiError> {
            Err(ApiError::Network("offline".to_string()))
        }

        async fn clear_chat(&self) -> Result<(), ApiError> {
            Ok(())
        }

        async fn new_conversation(&self) -> Result<String, ApiError> {
            Ok("/".to_string())
        }

        async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError> {
            if self.0.is_empty() {
                Err(ApiError::Status {
                    status: 503,
                    body: "down".to_string(),
                })
            } else {
                Ok(self.0.clone())
            }
        }

        async fn switch_conversation(&self, _id: &str) -> Result<String, ApiError> {
            Ok("/".to_string())
        }

        async fn logout(&self) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn summary(id: &str, is_current: bool) -> ConversationSummary {
        ConversationSummary {
            id: id.to_string(),
            title: format!("Conversation {}", id),
            timestamp: "2024-05-03 09:12".to_string(),
            is_current,
        }
    }

    #[test]
    fn key_falls_back_without_current() {
        let list = vec![summary("1", false), summary("2", false)];
        assert!(current_of(&list).is_none());
        assert_eq!(transcript_key(current_of(&list)), FALLBACK_TRANSCRIPT_KEY);

        let list = vec![summary("1", false), summary("2", true)];
        assert_eq!(transcript_key(current_of(&list)), "2");
    }

    #[tokio::test]
    async fn refresh_loads_transcript_of_current() {
        let db = Database::new_in_memory().unwrap();
        db.insert_message(&ChatMessage::new("2", Sender::User, "payslip for May?"))
            .await
            .unwrap();
        db.insert_message(&ChatMessage::new("1", Sender::User, "old question"))
            .await
            .unwrap();

        let backend = ListBackend(vec![summary("1", false), summary("2", true)]);
        let snapshot = refresh(&backend, &db).await.unwrap();

        assert_eq!(snapshot.conversations.len(), 2);
        assert_eq!(snapshot.current.map(|c| c.id), Some("2".to_string()));
        assert_eq!(snapshot.transcript.len(), 1);
        assert_eq!(snapshot.transcript[0].text, "payslip for May?");
    }

    #[tokio::test]
    async fn refresh_fails_when_server_does() {
        let db = Database::new_in_memory().unwrap();
        let backend = ListBackend(Vec::new());
        assert!(refresh(&backend, &db).await.is_err());
    }
}
