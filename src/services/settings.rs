use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::database::Database;
use crate::config;

pub const KEY_DARK_MODE: &str = "darkMode";
pub const KEY_SPEECH_LANGUAGE: &str = "speechLanguage";
pub const KEY_SERVER_URL: &str = "serverUrl";
pub const KEY_INPUT_MODE: &str = "inputMode";

/// Locales offered for speech recognition, as (tag, label).
pub const SPEECH_LANGUAGES: &[(&str, &str)] = &[
    ("en-US", "English (United States)"),
    ("en-GB", "English (United Kingdom)"),
    ("fr-FR", "Français"),
    ("es-ES", "Español"),
    ("de-DE", "Deutsch"),
    ("it-IT", "Italiano"),
    ("pt-BR", "Português (Brasil)"),
    ("nl-NL", "Nederlands"),
    ("ja-JP", "日本語"),
    ("zh-CN", "中文 (简体)"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    pub dark_mode: bool,
    pub speech_language: String,
    pub server_url: String,
    pub input_mode: InputMode,
}

/// Which endpoint user input goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputMode {
    Chat,
    Query,
}

impl InputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputMode::Chat => "chat",
            InputMode::Query => "query",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(InputMode::Chat),
            "query" => Some(InputMode::Query),
            _ => None,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            speech_language: config::DEFAULT_SPEECH_LANGUAGE.to_string(),
            server_url: config::DEFAULT_SERVER_URL.to_string(),
            input_mode: InputMode::Chat,
        }
    }
}

pub fn speech_language_index(tag: &str) -> Option<usize> {
    SPEECH_LANGUAGES.iter().position(|(t, _)| *t == tag)
}

pub struct SettingsService;

impl SettingsService {
    /// Read settings from the store. Unreadable values keep their defaults.
    pub async fn load(db: &Database) -> ClientSettings {
        let mut settings = ClientSettings::default();

        match db.get_setting(KEY_DARK_MODE).await {
            Ok(value) => settings.dark_mode = value.as_deref() == Some("true"),
            Err(e) => tracing::warn!("Failed to read {}: {}", KEY_DARK_MODE, e),
        }

        match db.get_setting(KEY_SPEECH_LANGUAGE).await {
            Ok(Some(lang)) if !lang.trim().is_empty() => settings.speech_language = lang,
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read {}: {}", KEY_SPEECH_LANGUAGE, e),
        }

        match db.get_setting(KEY_SERVER_URL).await {
            Ok(Some(url)) if !url.trim().is_empty() => settings.server_url = url,
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read {}: {}", KEY_SERVER_URL, e),
        }

        if let Ok(Some(mode)) = db.get_setting(KEY_INPUT_MODE).await {
            if let Some(mode) = InputMode::from_str(&mode) {
                settings.input_mode = mode;
            }
        }

        settings
    }

    /// Write every key in one transaction.
    pub async fn save(db: &Database, settings: &ClientSettings) -> Result<()> {
        db.set_settings(vec![
            (
                KEY_DARK_MODE,
                if settings.dark_mode { "true" } else { "false" }.to_string(),
            ),
            (KEY_SPEECH_LANGUAGE, settings.speech_language.clone()),
            (KEY_SERVER_URL, settings.server_url.clone()),
            (KEY_INPUT_MODE, settings.input_mode.as_str().to_string()),
        ])
        .await
    }

    /// The address to connect to. A non-blank `PARLEY_SERVER_URL` wins over
    /// the stored one for this run only and is never written back.
    pub fn effective_server_url(settings: &ClientSettings) -> String {
        server_url_with_override(&settings.server_url, std::env::var(config::SERVER_URL_ENV).ok())
    }
}

fn server_url_with_override(stored: &str, env_value: Option<String>) -> String {
    match env_value {
        Some(url) if !url.trim().is_empty() => {
            tracing::info!("Using server address from {}", config::SERVER_URL_ENV);
            url
        }
        _ => stored.to_string(),
    }
}

/// Saves settings snapshots one after another, in the order they were queued.
#[derive(Debug, Clone)]
pub struct SettingsWriter {
    tx: mpsc::UnboundedSender<ClientSettings>,
}

impl SettingsWriter {
    /// Returns the writer and the task that drains it. The task has to be
    /// spawned by the caller and finishes once every writer is dropped.
    pub fn new(db: Database) -> (Self, impl Future<Output = ()> + Send + 'static) {
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientSettings>();

        let task = async move {
            while let Some(mut settings) = rx.recv().await {
                // Older snapshots still queued are superseded.
                while let Ok(newer) = rx.try_recv() {
                    settings = newer;
                }
                if let Err(e) = SettingsService::save(&db, &settings).await {
                    tracing::error!("Failed to save settings: {:#}", e);
                }
            }
            tracing::debug!("Settings writer stopped");
        };

        (Self { tx }, task)
    }

    pub fn save(&self, settings: ClientSettings) {
        if self.tx.send(settings).is_err() {
            tracing::warn!("Settings writer is gone, change not saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_when_store_is_empty() {
        let db = Database::new_in_memory().unwrap();
        let settings = SettingsService::load(&db).await;
        assert!(!settings.dark_mode);
        assert_eq!(settings.speech_language, "en-US");
        assert_eq!(settings.input_mode, InputMode::Chat);
    }

    #[tokio::test]
    async fn save_writes_browser_compatible_values() {
        let db = Database::new_in_memory().unwrap();
        let settings = ClientSettings {
            dark_mode: true,
            speech_language: "fr-FR".to_string(),
            server_url: "http://hr.internal:5000".to_string(),
            input_mode: InputMode::Query,
        };
        SettingsService::save(&db, &settings).await.unwrap();

        assert_eq!(db.get_setting("darkMode").await.unwrap().as_deref(), Some("true"));
        assert_eq!(
            db.get_setting("speechLanguage").await.unwrap().as_deref(),
            Some("fr-FR")
        );

        let loaded = SettingsService::load(&db).await;
        assert!(loaded.dark_mode);
        assert_eq!(loaded.speech_language, "fr-FR");
        assert_eq!(loaded.input_mode, InputMode::Query);
    }

    #[tokio::test]
    async fn dark_mode_requires_exact_true() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("darkMode", "TRUE").await.unwrap();
        assert!(!SettingsService::load(&db).await.dark_mode);

        db.set_setting("darkMode", "true").await.unwrap();
        assert!(SettingsService::load(&db).await.dark_mode);
    }

    #[tokio::test]
    async fn blank_language_keeps_default() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("speechLanguage", "").await.unwrap();
        assert_eq!(SettingsService::load(&db).await.speech_language, "en-US");
    }

    #[tokio::test]
    async fn env_override_is_never_stored() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("serverUrl", "http://stored.example:5000").await.unwrap();

        std::env::set_var(config::SERVER_URL_ENV, "http://env-override:9999");
        let mut settings = SettingsService::load(&db).await;
        let effective = SettingsService::effective_server_url(&settings);
        settings.dark_mode = true;
        SettingsService::save(&db, &settings).await.unwrap();
        std::env::remove_var(config::SERVER_URL_ENV);

        assert_eq!(effective, "http://env-override:9999");
        assert_eq!(
            db.get_setting("serverUrl").await.unwrap().as_deref(),
            Some("http://stored.example:5000")
        );
        let reloaded = SettingsService::load(&db).await;
        assert!(reloaded.dark_mode);
        assert_eq!(reloaded.server_url, "http://stored.example:5000");
    }

    #[test]
    fn blank_override_keeps_stored_url() {
        assert_eq!(
            server_url_with_override("http://stored:5000", Some("  ".to_string())),
            "http://stored:5000"
        );
        assert_eq!(server_url_with_override("http://stored:5000", None), "http://stored:5000");
        assert_eq!(
            server_url_with_override("http://stored:5000", Some("http://env:1".to_string())),
            "http://env:1"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn queued_saves_land_in_order() {
        for _ in 0..50 {
            let db = Database::new_in_memory().unwrap();
            let (writer, task) = SettingsWriter::new(db.clone());
            let handle = tokio::spawn(task);

            let mut settings = ClientSettings::default();
            writer.save(settings.clone());
            settings.dark_mode = true;
            writer.save(settings.clone());
            settings.speech_language = "fr-FR".to_string();
            writer.save(settings.clone());

            drop(writer);
            handle.await.unwrap();

            let stored = SettingsService::load(&db).await;
            assert_eq!(stored, settings);
        }
    }

    #[tokio::test]
    async fn writer_keeps_saving_across_bursts() {
        let db = Database::new_in_memory().unwrap();
        let (writer, task) = SettingsWriter::new(db.clone());
        let handle = tokio::spawn(task);

        let mut settings = ClientSettings::default();
        settings.input_mode = InputMode::Query;
        writer.save(settings.clone());
        tokio::task::yield_now().await;
        settings.speech_language = "ja-JP".to_string();
        writer.save(settings.clone());

        drop(writer);
        handle.await.unwrap();
        assert_eq!(SettingsService::load(&db).await, settings);
    }

    #[test]
    fn language_index_lookup() {
        assert_eq!(speech_language_index("en-US"), Some(0));
        assert_eq!(speech_language_index("fr-FR"), Some(2));
        assert_eq!(speech_language_index("xx-XX"), None);
    }
}
