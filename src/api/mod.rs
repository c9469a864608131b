pub mod client;
pub mod traits;
pub mod types;

pub use client::ServerClient;
pub use traits::ChatBackend;
pub use types::{ApiError, QueryReply};
