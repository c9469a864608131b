use async_trait::async_trait;

use super::types::{ApiError, QueryReply};
use crate::models::ConversationSummary;

/// The assistant server as seen by the client. Every call is one HTTP round trip.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn base_url(&self) -> &str;

    /// Returns the assistant's reply text.
    async fn send_message(&self, message: &str) -> Result<String, ApiError>;

    async fn process_input(&self, query: &str) -> Result<QueryReply, ApiError>;

    async fn clear_chat(&self) -> Result<(), ApiError>;

    /// Returns the redirect target announced by the server.
    async fn new_conversation(&self) -> Result<String, ApiError>;

    async fn get_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError>;

    /// Returns the redirect target announced by the server.
    async fn switch_conversation(&self, id: &str) -> Result<String, ApiError>;

    /// Ends the server-side session.
    async fn logout(&self) -> Result<(), ApiError>;
}
