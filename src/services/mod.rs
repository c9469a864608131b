pub mod chat;
pub mod conversation;
pub mod database;
pub mod markdown;
pub mod settings;
pub mod speech;

pub use database::Database;
pub use settings::SettingsService;
