use adw::prelude::*;
use relm4::prelude::*;

use crate::app::AppMsg;
use crate::config;
use crate::services::settings::ClientSettings;
use crate::ui::preferences::appearance_page::{AppearancePage, AppearancePageOutput};
use crate::ui::preferences::connection_page::{ConnectionPage, ConnectionPageOutput};
use crate::ui::preferences::speech_page::{SpeechPage, SpeechPageOutput};

/// Returned handles from `create_preferences_window` so the caller can store them.
pub struct PreferencesHandles {
    pub window: adw::PreferencesWindow,
    pub appearance_page: Controller<AppearancePage>,
    pub speech_page: Controller<SpeechPage>,
    pub connection_page: Controller<ConnectionPage>,
}

pub fn create_preferences_window(
    parent: &adw::ApplicationWindow,
    sender: &relm4::Sender<AppMsg>,
    settings: &ClientSettings,
) -> PreferencesHandles {
    let appearance_page = AppearancePage::builder()
        .launch(settings.dark_mode)
        .forward(sender, |output| match output {
            AppearancePageOutput::DarkModeChanged(dark) => AppMsg::DarkModeChanged(dark),
        });

    let speech_page = SpeechPage::builder()
        .launch(settings.speech_language.clone())
        .forward(sender, |output| match output {
            SpeechPageOutput::LanguageChanged(lang) => AppMsg::SpeechLanguageChanged(lang),
        });

    let connection_page = ConnectionPage::builder()
        .launch(settings.server_url.clone())
        .forward(sender, |output| match output {
            ConnectionPageOutput::ServerUrlChanged(url) => AppMsg::ServerUrlChanged(url),
        });

    let prefs_window = adw::PreferencesWindow::new();
    prefs_window.set_title(Some("Preferences"));
    prefs_window.set_transient_for(Some(parent));
    prefs_window.set_modal(true);
    prefs_window.add(appearance_page.widget());
    prefs_window.add(speech_page.widget());
    prefs_window.add(connection_page.widget());

    prefs_window.present();

    PreferencesHandles {
        window: prefs_window,
        appearance_page,
        speech_page,
        connection_page,
    }
}

pub fn create_shortcuts_window(parent: &adw::ApplicationWindow) {
    let window = gtk::ShortcutsWindow::builder()
        .transient_for(parent)
        .modal(true)
        .build();

    let general_group = gtk::ShortcutsGroup::builder()
        .title("General")
        .build();

    for (title, accel) in [
        ("New conversation", "<Control>n"),
        ("Preferences", "<Control>comma"),
        ("Keyboard shortcuts", "<Control>question"),
    ] {
        let shortcut = gtk::ShortcutsShortcut::builder()
            .title(title)
            .accelerator(accel)
            .build();
        general_group.add_shortcut(&shortcut);
    }

    let chat_group = gtk::ShortcutsGroup::builder()
        .title("Chat")
        .build();

    for (title, accel) in [
        ("Send message", "Return"),
        ("New line", "<Shift>Return"),
        ("Clear chat", "<Control>l"),
    ] {
        let shortcut = gtk::ShortcutsShortcut::builder()
            .title(title)
            .accelerator(accel)
            .build();
        chat_group.add_shortcut(&shortcut);
    }

    let section = gtk::ShortcutsSection::builder()
        .title(config::APP_NAME)
        .build();
    section.add_group(&general_group);
    section.add_group(&chat_group);

    window.add_section(&section);
    window.present();
}

pub fn create_about_dialog(parent: &adw::ApplicationWindow) {
    let about = adw::AboutWindow::builder()
        .application_name(config::APP_NAME)
        .version(config::VERSION)
        .developer_name("Parley Contributors")
        .license_type(gtk::License::Gpl30)
        .comments("A desktop client for a conversational assistant server")
        .application_icon(config::APP_ID)
        .build();
    about.set_transient_for(Some(parent));
    about.present();
}
