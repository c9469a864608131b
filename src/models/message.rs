use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "assistant" => Some(Sender::Assistant),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(conversation_id: &str, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Two-digit hour and minute in local time, e.g. "09:41 AM".
    pub fn time_label(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%I:%M %p")
            .to_string()
    }
}
