pub const APP_ID: &str = "org.parley.Parley";
pub const APP_NAME: &str = "Parley";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const RESOURCE_PREFIX: &str = "/org/parley/Parley";

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_SPEECH_LANGUAGE: &str = "en-US";

/// Overrides the server address stored in settings.
pub const SERVER_URL_ENV: &str = "PARLEY_SERVER_URL";
/// External speech recognizer, `{lang}` is replaced with the configured locale.
pub const DICTATION_CMD_ENV: &str = "PARLEY_DICTATION_CMD";

pub const REQUEST_TIMEOUT_SECS: u64 = 60;
pub const TOAST_TIMEOUT_SECS: u32 = 3;
