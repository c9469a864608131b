pub mod conversation;
pub mod message;

pub use conversation::ConversationSummary;
pub use message::{ChatMessage, Sender};
