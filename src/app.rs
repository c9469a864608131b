use std::sync::Arc;

use adw::prelude::*;
use relm4::prelude::*;

use crate::api::client::same_server;
use crate::api::{ApiError, ChatBackend, ServerClient};
use crate::config;
use crate::models::{ChatMessage, ConversationSummary, Sender};
use crate::services::chat::{self, SubmitBlocked, SEND_FAILED_MESSAGE};
use crate::services::conversation::{self, transcript_key, ConversationSnapshot};
use crate::services::settings::{ClientSettings, InputMode, SettingsWriter};
use crate::services::speech::DictationCommand;
use crate::services::{Database, SettingsService};
use crate::ui::chat_view::{ChatView, ChatViewMsg, ChatViewOutput};
use crate::ui::preferences::appearance_page::apply_dark_mode;
use crate::ui::sidebar::{Sidebar, SidebarMsg, SidebarOutput};
use crate::ui::window::PreferencesHandles;

pub struct App {
    db: Option<Database>,
    backend: Option<Arc<dyn ChatBackend>>,
    settings: ClientSettings,
    settings_writer: Option<SettingsWriter>,
    sidebar: Controller<Sidebar>,
    chat_view: Controller<ChatView>,
    toast_overlay: adw::ToastOverlay,
    window_title: adw::WindowTitle,
    query_toggle: gtk::ToggleButton,
    active_conversation: Option<ConversationSummary>,
    sending: bool,
    listening: bool,
    preferences: Option<PreferencesHandles>,
}

#[derive(Debug)]
pub enum AppMsg {
    Submit(String),
    Dictate,
    ClearChat,
    NewConversation,
    RefreshConversations,
    SwitchConversation(String),
    SetInputMode(InputMode),
    DarkModeChanged(bool),
    SpeechLanguageChanged(String),
    ServerUrlChanged(String),
    SignOut,
    ShowPreferences,
    ShowShortcuts,
    ShowAbout,
}

#[derive(Debug)]
pub enum AppCmd {
    Initialized(Database, ClientSettings),
    InitFailed(String),
    Replied(ChatMessage),
    SendFailed(ApiError),
    ChatCleared,
    /// The server accepted a new/switch request and points at `redirect`.
    Redirected(String),
    Refreshed(ConversationSnapshot),
    RefreshFailed(String),
    RequestFailed(String),
    /// The server wants a signed-in session before it answers.
    SignInRequired,
    /// Carries the logout error, if the server could not be told.
    SignedOut(Option<String>),
    Dictated(String),
    DictationFailed(String),
}

#[relm4::component(pub, async)]
impl AsyncComponent for App {
    type Init = ();
    type Input = AppMsg;
    type Output = ();
    type CommandOutput = AppCmd;

    view! {
        adw::ApplicationWindow {
            set_title: Some(config::APP_NAME),
            set_default_width: 1000,
            set_default_height: 720,
            set_width_request: 360,
            set_height_request: 480,

            #[local_ref]
            toast_overlay -> adw::ToastOverlay {},
        }
    }

    async fn init(
        _init: Self::Init,
        root: Self::Root,
        sender: AsyncComponentSender<Self>,
    ) -> AsyncComponentParts<Self> {
        let sidebar = Sidebar::builder()
            .launch(())
            .forward(sender.input_sender(), |output| match output {
                SidebarOutput::NewConversation => AppMsg::NewConversation,
                SidebarOutput::Refresh => AppMsg::RefreshConversations,
                SidebarOutput::SwitchConversation(id) => AppMsg::SwitchConversation(id),
            });

        let chat_view = ChatView::builder()
            .launch(InputMode::Chat)
            .forward(sender.input_sender(), |output| match output {
                ChatViewOutput::Submit(text) => AppMsg::Submit(text),
                ChatViewOutput::Dictate => AppMsg::Dictate,
            });

        let toast_overlay = adw::ToastOverlay::new();
        toast_overlay.set_hexpand(true);
        toast_overlay.set_vexpand(true);

        // Content header: title, clear, query toggle, main menu
        let window_title = adw::WindowTitle::new(config::APP_NAME, "");

        let content_header = adw::HeaderBar::new();
        content_header.set_show_start_title_buttons(false);
        content_header.set_title_widget(Some(&window_title));

        let clear_btn = gtk::Button::builder()
            .icon_name("edit-clear-all-symbolic")
            .tooltip_text("Clear Chat (Ctrl+L)")
            .build();
        let sender_clear = sender.clone();
        clear_btn.connect_clicked(move |_| {
            sender_clear.input(AppMsg::ClearChat);
        });
        content_header.pack_start(&clear_btn);

        let query_toggle = gtk::ToggleButton::builder()
            .icon_name("x-office-spreadsheet-symbolic")
            .tooltip_text("Query Mode: ask questions about your records")
            .build();
        let sender_mode = sender.clone();
        query_toggle.connect_toggled(move |button| {
            let mode = if button.is_active() {
                InputMode::Query
            } else {
                InputMode::Chat
            };
            sender_mode.input(AppMsg::SetInputMode(mode));
        });
        content_header.pack_start(&query_toggle);

        let menu = gio::Menu::new();
        menu.append(Some("Preferences"), Some("app.preferences"));
        menu.append(Some("Sign Out"), Some("app.sign-out"));
        menu.append(Some("Keyboard Shortcuts"), Some("app.show-shortcuts"));
        menu.append(Some(&format!("About {}", config::APP_NAME)), Some("app.about"));

        let menu_button = gtk::MenuButton::builder()
            .icon_name("open-menu-symbolic")
            .menu_model(&menu)
            .build();
        content_header.pack_end(&menu_button);

        let content_toolbar = adw::ToolbarView::new();
        content_toolbar.add_top_bar(&content_header);
        content_toolbar.set_content(Some(chat_view.widget()));

        let content_page = adw::NavigationPage::builder()
            .title("Chat")
            .tag("content")
            .child(&content_toolbar)
            .build();

        let sidebar_page = adw::NavigationPage::builder()
            .title("Conversations")
            .tag("sidebar")
            .child(sidebar.widget())
            .build();

        let split_view = adw::NavigationSplitView::new();
        split_view.set_hexpand(true);
        split_view.set_vexpand(true);
        split_view.set_min_sidebar_width(200.0);
        split_view.set_max_sidebar_width(300.0);
        split_view.set_sidebar(Some(&sidebar_page));
        split_view.set_content(Some(&content_page));

        match adw::BreakpointCondition::parse("max-width: 600px") {
            Ok(condition) => {
                let breakpoint = adw::Breakpoint::new(condition);
                breakpoint.add_setter(&split_view, "collapsed", Some(&true.to_value()));
                breakpoint.add_setter(
                    &content_header,
                    "show-start-title-buttons",
                    Some(&true.to_value()),
                );
                root.add_breakpoint(breakpoint);
            }
            Err(e) => tracing::warn!("Invalid breakpoint condition: {}", e),
        }

        toast_overlay.set_child(Some(&split_view));

        let model = App {
            db: None,
            backend: None,
            settings: ClientSettings::default(),
            settings_writer: None,
            sidebar,
            chat_view,
            toast_overlay: toast_overlay.clone(),
            window_title,
            query_toggle,
            active_conversation: None,
            sending: false,
            listening: false,
            preferences: None,
        };

        let widgets = view_output!();

        // App actions and keyboard shortcuts
        let app = relm4::main_adw_application();
        let actions: [(&str, &[&str], fn() -> AppMsg); 6] = [
            ("preferences", &["<Control>comma"], || AppMsg::ShowPreferences),
            ("new-conversation", &["<Control>n"], || AppMsg::NewConversation),
            ("clear-chat", &["<Control>l"], || AppMsg::ClearChat),
            ("show-shortcuts", &["<Control>question"], || AppMsg::ShowShortcuts),
            ("sign-out", &[], || AppMsg::SignOut),
            ("about", &[], || AppMsg::ShowAbout),
        ];
        for (name, accels, msg) in actions {
            let sender_action = sender.clone();
            let action = gio::SimpleAction::new(name, None);
            action.connect_activate(move |_, _| {
                sender_action.input(msg());
            });
            app.add_action(&action);
            if !accels.is_empty() {
                app.set_accels_for_action(&format!("app.{}", name), accels);
            }
        }

        // Async initialization
        sender.command(|out, _| {
            Box::pin(async move {
                match Self::async_init().await {
                    Ok((db, settings)) => {
                        let _ = out.send(AppCmd::Initialized(db, settings));
                    }
                    Err(e) => {
                        tracing::error!("Initialization failed: {:#}", e);
                        let _ = out.send(AppCmd::InitFailed(e.to_string()));
                    }
                }
            })
        });

        AsyncComponentParts { model, widgets }
    }

    async fn update(
        &mut self,
        msg: Self::Input,
        sender: AsyncComponentSender<Self>,
        root: &Self::Root,
    ) {
        match msg {
            AppMsg::Submit(text) => {
                self.handle_submit(text, &sender);
            }
            AppMsg::Dictate => {
                self.handle_dictate(&sender);
            }
            AppMsg::ClearChat => {
                let (Some(backend), Some(db)) = self.connection() else {
                    self.show_toast("Not connected yet");
                    return;
                };
                let key = transcript_key(self.active_conversation.as_ref());
                sender.command(move |out, _| {
                    Box::pin(async move {
                        if let Err(e) = backend.clear_chat().await {
                            tracing::error!("Failed to clear chat: {}", e);
                            let _ = out.send(request_failed("Could not clear chat", e));
                            return;
                        }
                        match db.clear_messages(&key).await {
                            Ok(n) => tracing::debug!("Removed {} cached messages for {}", n, key),
                            Err(e) => tracing::error!("Failed to clear cached transcript: {}", e),
                        }
                        let _ = out.send(AppCmd::ChatCleared);
                    })
                });
            }
            AppMsg::NewConversation => {
                let Some(backend) = self.backend.clone() else {
                    self.show_toast("Not connected yet");
                    return;
                };
                sender.command(move |out, _| {
                    Box::pin(async move {
                        match backend.new_conversation().await {
                            Ok(redirect) => {
                                let _ = out.send(AppCmd::Redirected(redirect));
                            }
                            Err(e) => {
                                tracing::error!("Failed to start conversation: {}", e);
                                let _ = out.send(request_failed(
                                    "Could not start a new conversation",
                                    e,
                                ));
                            }
                        }
                    })
                });
            }
            AppMsg::SwitchConversation(id) => {
                if self.active_conversation.as_ref().is_some_and(|c| c.id == id) {
                    return;
                }
                let Some(backend) = self.backend.clone() else {
                    self.show_toast("Not connected yet");
                    return;
                };
                sender.command(move |out, _| {
                    Box::pin(async move {
                        match backend.switch_conversation(&id).await {
                            Ok(redirect) => {
                                let _ = out.send(AppCmd::Redirected(redirect));
                            }
                            Err(e) => {
                                tracing::error!("Failed to switch to conversation {}: {}", id, e);
                                let _ = out.send(request_failed("Could not open conversation", e));
                            }
                        }
                    })
                });
            }
            AppMsg::RefreshConversations => {
                let (Some(backend), Some(db)) = self.connection() else {
                    return;
                };
                self.sidebar.emit(SidebarMsg::SetLoading(true));
                sender.command(move |out, _| {
                    Box::pin(async move {
                        match conversation::refresh(backend.as_ref(), &db).await {
                            Ok(snapshot) => {
                                let _ = out.send(AppCmd::Refreshed(snapshot));
                            }
                            Err(e) => {
                                tracing::error!("Failed to load conversations: {}", e);
                                let cmd = match e.downcast_ref::<ApiError>() {
                                    Some(ApiError::Unauthorized) => AppCmd::SignInRequired,
                                    _ => AppCmd::RefreshFailed(e.to_string()),
                                };
                                let _ = out.send(cmd);
                            }
                        }
                    })
                });
            }
            AppMsg::SetInputMode(mode) => {
                if self.settings.input_mode == mode {
                    return;
                }
                self.settings.input_mode = mode;
                self.chat_view.emit(ChatViewMsg::SetMode(mode));
                self.persist_settings();
            }
            AppMsg::DarkModeChanged(dark_mode) => {
                self.settings.dark_mode = dark_mode;
                self.persist_settings();
            }
            AppMsg::SpeechLanguageChanged(language) => {
                self.settings.speech_language = language;
                self.persist_settings();
            }
            AppMsg::ServerUrlChanged(url) => {
                // Reconnecting drops the cookie jar, and with it the session.
                let in_use = self
                    .backend
                    .as_ref()
                    .is_some_and(|backend| same_server(backend.base_url(), &url));
                if !in_use && !self.connect(&url) {
                    return;
                }
                if !same_server(&self.settings.server_url, &url) {
                    self.settings.server_url = url;
                    self.persist_settings();
                }
                if !in_use {
                    self.active_conversation = None;
                    self.chat_view.emit(ChatViewMsg::Clear);
                    sender.input(AppMsg::RefreshConversations);
                }
            }
            AppMsg::SignOut => {
                let Some(backend) = self.backend.clone() else {
                    self.show_toast("Not connected yet");
                    return;
                };
                sender.command(move |out, _| {
                    Box::pin(async move {
                        let failure = match backend.logout().await {
                            Ok(()) => None,
                            Err(e) => {
                                tracing::warn!("Server logout failed: {}", e);
                                Some(e.to_string())
                            }
                        };
                        let _ = out.send(AppCmd::SignedOut(failure));
                    })
                });
            }
            AppMsg::ShowPreferences => {
                self.preferences = Some(crate::ui::window::create_preferences_window(
                    root,
                    sender.input_sender(),
                    &self.settings,
                ));
            }
            AppMsg::ShowShortcuts => {
                crate::ui::window::create_shortcuts_window(root);
            }
            AppMsg::ShowAbout => {
                crate::ui::window::create_about_dialog(root);
            }
        }
    }

    async fn update_cmd(
        &mut self,
        msg: Self::CommandOutput,
        sender: AsyncComponentSender<Self>,
        _root: &Self::Root,
    ) {
        match msg {
            AppCmd::Initialized(db, settings) => {
                tracing::info!("Store ready, stored server {}", settings.server_url);
                let (writer, task) = SettingsWriter::new(db.clone());
                sender.command(move |_out, _| Box::pin(task));
                self.settings_writer = Some(writer);
                self.db = Some(db);
                self.settings = settings;
                apply_dark_mode(self.settings.dark_mode);

                let server_url = SettingsService::effective_server_url(&self.settings);
                if !self.connect(&server_url) {
                    self.connect(config::DEFAULT_SERVER_URL);
                }

                let mode = self.settings.input_mode;
                self.chat_view.emit(ChatViewMsg::SetMode(mode));
                self.query_toggle.set_active(mode == InputMode::Query);

                sender.input(AppMsg::RefreshConversations);
            }
            AppCmd::InitFailed(err) => {
                self.show_toast(&format!("Error: {}", err));
            }
            AppCmd::Replied(message) => {
                self.set_sending(false);
                // The reply belongs to whichever conversation was active at send time.
                if message.conversation_id == transcript_key(self.active_conversation.as_ref()) {
                    self.chat_view.emit(ChatViewMsg::AddMessage(message));
                }
            }
            AppCmd::SendFailed(err) => {
                tracing::debug!("Send failed: {}", err);
                self.set_sending(false);
                match err {
                    ApiError::Unauthorized => self.show_toast(SIGN_IN_REQUIRED_MESSAGE),
                    _ => self.show_toast(SEND_FAILED_MESSAGE),
                }
            }
            AppCmd::ChatCleared => {
                self.chat_view.emit(ChatViewMsg::Clear);
                self.show_toast("Chat cleared");
            }
            AppCmd::Redirected(redirect) => {
                tracing::debug!("Following server redirect to {}", redirect);
                sender.input(AppMsg::RefreshConversations);
            }
            AppCmd::Refreshed(snapshot) => {
                self.apply_snapshot(snapshot);
            }
            AppCmd::RefreshFailed(err) => {
                self.sidebar.emit(SidebarMsg::SetLoading(false));
                self.show_toast(&format!("Could not load conversations: {}", err));
            }
            AppCmd::RequestFailed(err) => {
                self.show_toast(&err);
            }
            AppCmd::SignInRequired => {
                self.sidebar.emit(SidebarMsg::SetLoading(false));
                self.show_toast(SIGN_IN_REQUIRED_MESSAGE);
            }
            AppCmd::SignedOut(failure) => {
                // A fresh client starts with an empty cookie jar.
                if let Some(url) = self.backend.as_ref().map(|b| b.base_url().to_string()) {
                    self.connect(&url);
                }
                self.active_conversation = None;
                self.chat_view.emit(ChatViewMsg::Clear);
                match failure {
                    None => self.show_toast("Signed out"),
                    Some(err) => self.show_toast(&format!("Signed out locally: {}", err)),
                }
                sender.input(AppMsg::RefreshConversations);
            }
            AppCmd::Dictated(text) => {
                self.set_listening(false);
                self.chat_view.emit(ChatViewMsg::SetInputText(text));
            }
            AppCmd::DictationFailed(err) => {
                self.set_listening(false);
                self.show_toast(&err);
            }
        }
    }
}

const SIGN_IN_REQUIRED_MESSAGE: &str = "Sign-in required. Sign in to the server and try again.";

fn request_failed(context: &str, error: ApiError) -> AppCmd {
    match error {
        ApiError::Unauthorized => AppCmd::SignInRequired,
        other => AppCmd::RequestFailed(format!("{}: {}", context, other)),
    }
}

impl App {
    async fn async_init() -> anyhow::Result<(Database, ClientSettings)> {
        let db = Database::new().await?;
        let settings = SettingsService::load(&db).await;
        Ok((db, settings))
    }

    fn show_toast(&self, message: &str) {
        let toast = adw::Toast::new(message);
        toast.set_timeout(config::TOAST_TIMEOUT_SECS);
        self.toast_overlay.add_toast(toast);
    }

    fn connection(&self) -> (Option<Arc<dyn ChatBackend>>, Option<Database>) {
        (self.backend.clone(), self.db.clone())
    }

    /// Replace the server client. Returns false and keeps the old client when
    /// `url` is not a usable server address.
    fn connect(&mut self, url: &str) -> bool {
        match ServerClient::new(url) {
            Ok(client) => {
                tracing::info!("Using server {}", client.base_url());
                self.window_title.set_subtitle(client.base_url());
                self.backend = Some(Arc::new(client));
                true
            }
            Err(e) => {
                tracing::error!("Invalid server address {}: {}", url, e);
                self.show_toast(&format!("Invalid server address: {}", e));
                false
            }
        }
    }

    fn set_sending(&mut self, sending: bool) {
        self.sending = sending;
        self.chat_view.emit(ChatViewMsg::SetTyping(sending));
    }

    fn set_listening(&mut self, listening: bool) {
        self.listening = listening;
        self.chat_view.emit(ChatViewMsg::SetListening(listening));
    }

    fn apply_snapshot(&mut self, snapshot: ConversationSnapshot) {
        let ConversationSnapshot {
            conversations,
            current,
            transcript,
        } = snapshot;

        let title = current
            .as_ref()
            .map(|c| c.display_title().to_string())
            .unwrap_or_else(|| config::APP_NAME.to_string());
        self.window_title.set_title(&title);

        self.active_conversation = current;
        self.sidebar.emit(SidebarMsg::LoadConversations(conversations));
        self.chat_view.emit(ChatViewMsg::LoadMessages(transcript));
    }

    fn persist_settings(&self) {
        match &self.settings_writer {
            Some(writer) => writer.save(self.settings.clone()),
            None => tracing::warn!("Settings changed before the store was ready"),
        }
    }

    fn handle_submit(&mut self, text: String, sender: &AsyncComponentSender<Self>) {
        let (backend, db) = self.connection();
        let connected = backend.is_some() && db.is_some();
        let text = match chat::accept_submission(&text, self.sending, connected) {
            Ok(text) => text,
            Err(SubmitBlocked::NotConnected) => {
                self.show_toast("Not connected yet");
                return;
            }
            Err(SubmitBlocked::Empty | SubmitBlocked::Busy) => return,
        };
        let (Some(backend), Some(db)) = (backend, db) else {
            return;
        };
        self.chat_view.emit(ChatViewMsg::SetInputText(String::new()));

        let key = transcript_key(self.active_conversation.as_ref());
        let user_msg = ChatMessage::new(&key, Sender::User, text.clone());
        self.chat_view.emit(ChatViewMsg::AddMessage(user_msg.clone()));
        self.set_sending(true);

        let mode = self.settings.input_mode;
        sender.command(move |out, _| {
            Box::pin(async move {
                if let Err(e) = db.insert_message(&user_msg).await {
                    tracing::error!("Failed to cache user message: {}", e);
                }

                match chat::dispatch(backend.as_ref(), mode, &text).await {
                    Ok(reply) => {
                        let reply = ChatMessage::new(&key, Sender::Assistant, reply);
                        if let Err(e) = db.insert_message(&reply).await {
                            tracing::error!("Failed to cache assistant message: {}", e);
                        }
                        let _ = out.send(AppCmd::Replied(reply));
                    }
                    Err(e) => {
                        tracing::error!("Failed to send message: {}", e);
                        let _ = out.send(AppCmd::SendFailed(e));
                    }
                }
            })
        });
    }

    fn handle_dictate(&mut self, sender: &AsyncComponentSender<Self>) {
        if self.listening {
            return;
        }
        let Some(command) = DictationCommand::from_env(&self.settings.speech_language) else {
            self.show_toast(&format!(
                "Speech recognition is not configured (set {})",
                config::DICTATION_CMD_ENV
            ));
            return;
        };

        self.set_listening(true);
        sender.command(move |out, _| {
            Box::pin(async move {
                match command.run().await {
                    Ok(text) => {
                        let _ = out.send(AppCmd::Dictated(text));
                    }
                    Err(e) => {
                        tracing::warn!("Dictation failed: {:#}", e);
                        let _ = out.send(AppCmd::DictationFailed(format!(
                            "Speech recognition failed: {}",
                            e
                        )));
                    }
                }
            })
        });
    }
}
