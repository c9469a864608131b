use adw::prelude::*;
use relm4::prelude::*;

use crate::config;
use crate::services::settings::{speech_language_index, SPEECH_LANGUAGES};

pub struct SpeechPage {
    language: String,
}

#[derive(Debug)]
pub enum SpeechPageMsg {
    LanguageSelected(u32),
}

#[derive(Debug)]
pub enum SpeechPageOutput {
    LanguageChanged(String),
}

#[relm4::component(pub)]
impl Component for SpeechPage {
    type Init = String;
    type Input = SpeechPageMsg;
    type Output = SpeechPageOutput;
    type CommandOutput = ();

    view! {
        adw::PreferencesPage {
            set_title: "Speech",
            set_icon_name: Some("audio-input-microphone-symbolic"),

            adw::PreferencesGroup {
                set_title: "Dictation",
                set_description: Some(dictation_hint().as_str()),

                adw::ComboRow {
                    set_title: "Recognition language",
                    set_model: Some(&gtk::StringList::new(&language_labels())),
                    set_selected: speech_language_index(&model.language).unwrap_or(0) as u32,
                    connect_selected_notify[sender] => move |row| {
                        sender.input(SpeechPageMsg::LanguageSelected(row.selected()));
                    },
                },
            },
        }
    }

    fn init(
        language: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let model = Self { language };
        let widgets = view_output!();
        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            SpeechPageMsg::LanguageSelected(idx) => {
                let Some((tag, _)) = SPEECH_LANGUAGES.get(idx as usize) else {
                    return;
                };
                if self.language == *tag {
                    return;
                }
                self.language = tag.to_string();
                let _ = sender.output(SpeechPageOutput::LanguageChanged(self.language.clone()));
            }
        }
    }
}

fn language_labels() -> Vec<&'static str> {
    SPEECH_LANGUAGES.iter().map(|(_, label)| *label).collect()
}

fn dictation_hint() -> String {
    match std::env::var(config::DICTATION_CMD_ENV) {
        Ok(cmd) if !cmd.trim().is_empty() => format!("Recognizer: {}", cmd.trim()),
        _ => format!(
            "Set {} to a speech recognizer command; {{lang}} is replaced by the language tag",
            config::DICTATION_CMD_ENV
        ),
    }
}
