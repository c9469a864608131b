use gtk::prelude::*;
use relm4::prelude::*;

use crate::services::chat;
use crate::services::settings::InputMode;

pub struct InputArea {
    buffer: gtk::TextBuffer,
    sending: bool,
    listening: bool,
    mode: InputMode,
    char_count: i32,
}

#[derive(Debug)]
pub enum InputAreaMsg {
    SendClicked,
    MicClicked,
    SetSending(bool),
    SetListening(bool),
    SetMode(InputMode),
    /// Replace the draft, e.g. with a dictation transcript.
    SetText(String),
    // Internal
    TextChanged,
}

#[derive(Debug)]
pub enum InputAreaOutput {
    Submit(String),
    Dictate,
}

#[relm4::component(pub)]
impl Component for InputArea {
    type Init = InputMode;
    type Input = InputAreaMsg;
    type Output = InputAreaOutput;
    type CommandOutput = ();

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Vertical,
            set_spacing: 0,

            gtk::Box {
                set_orientation: gtk::Orientation::Vertical,
                set_margin_top: 8,
                set_margin_bottom: 8,
                set_margin_start: 12,
                set_margin_end: 12,
                add_css_class: "input-card",

                gtk::Overlay {
                    set_hexpand: true,

                    gtk::ScrolledWindow {
                        set_hexpand: true,
                        set_max_content_height: 150,
                        set_propagate_natural_height: true,
                        set_min_content_height: 40,

                        #[name = "text_view"]
                        gtk::TextView {
                            set_wrap_mode: gtk::WrapMode::WordChar,
                            set_accepts_tab: false,
                            set_top_margin: 8,
                            set_bottom_margin: 8,
                            set_left_margin: 8,
                            set_right_margin: 8,
                            add_css_class: "input-text-view",

                            set_buffer: Some(&model.buffer),
                        },
                    },

                    add_overlay = &gtk::Label {
                        set_halign: gtk::Align::Start,
                        set_valign: gtk::Align::Start,
                        set_margin_start: 12,
                        set_margin_top: 8,
                        set_can_target: false,
                        add_css_class: "input-placeholder",
                        #[watch]
                        set_label: placeholder(model.mode),
                        #[watch]
                        set_visible: model.char_count == 0 && !model.sending,
                    },
                },

                gtk::Box {
                    set_orientation: gtk::Orientation::Horizontal,
                    set_spacing: 4,
                    set_margin_start: 4,
                    set_margin_end: 4,
                    set_margin_bottom: 4,
                    add_css_class: "input-toolbar",

                    gtk::Button {
                        set_icon_name: "audio-input-microphone-symbolic",
                        set_tooltip_text: Some("Dictate"),
                        set_halign: gtk::Align::Start,
                        add_css_class: "flat",
                        add_css_class: "circular",
                        #[watch]
                        set_sensitive: !model.sending && !model.listening,
                        connect_clicked => InputAreaMsg::MicClicked,
                    },

                    gtk::Label {
                        set_label: "Listening...",
                        add_css_class: "dim-label",
                        add_css_class: "caption",
                        #[watch]
                        set_visible: model.listening,
                    },

                    gtk::Box {
                        set_hexpand: true,
                    },

                    gtk::Button {
                        set_icon_name: "go-up-symbolic",
                        set_tooltip_text: Some("Send message (Enter)"),
                        set_halign: gtk::Align::End,
                        add_css_class: "suggested-action",
                        add_css_class: "circular",
                        #[watch]
                        set_sensitive: !model.sending && model.char_count > 0,
                        connect_clicked => InputAreaMsg::SendClicked,
                    },
                },
            },
        }
    }

    fn init(
        mode: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let buffer = gtk::TextBuffer::new(None::<&gtk::TextTagTable>);

        let model = Self {
            buffer: buffer.clone(),
            sending: false,
            listening: false,
            mode,
            char_count: 0,
        };

        let widgets = view_output!();

        // Enter sends, Shift+Enter inserts a newline
        let sender_key = sender.clone();
        let key_controller = gtk::EventControllerKey::new();
        key_controller.connect_key_pressed(move |_, key, _code, modifier| {
            let is_enter = key == gtk::gdk::Key::Return || key == gtk::gdk::Key::KP_Enter;
            if is_enter && !modifier.contains(gtk::gdk::ModifierType::SHIFT_MASK) {
                sender_key.input(InputAreaMsg::SendClicked);
                gtk::glib::Propagation::Stop
            } else {
                gtk::glib::Propagation::Proceed
            }
        });
        widgets.text_view.add_controller(key_controller);

        let sender_buf = sender.clone();
        buffer.connect_changed(move |_| {
            sender_buf.input(InputAreaMsg::TextChanged);
        });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            InputAreaMsg::SendClicked => {
                if self.sending {
                    return;
                }
                // The draft stays put until the app accepts it and clears the entry.
                if let Some(text) = chat::prepare_input(&self.get_text()) {
                    let _ = sender.output(InputAreaOutput::Submit(text));
                }
            }
            InputAreaMsg::MicClicked => {
                if !self.sending && !self.listening {
                    let _ = sender.output(InputAreaOutput::Dictate);
                }
            }
            InputAreaMsg::SetSending(sending) => {
                self.sending = sending;
            }
            InputAreaMsg::SetListening(listening) => {
                self.listening = listening;
            }
            InputAreaMsg::SetMode(mode) => {
                self.mode = mode;
            }
            InputAreaMsg::SetText(text) => {
                self.buffer.set_text(&text);
            }
            InputAreaMsg::TextChanged => {
                self.char_count = self.buffer.char_count();
            }
        }
    }
}

impl InputArea {
    fn get_text(&self) -> String {
        let start = self.buffer.start_iter();
        let end = self.buffer.end_iter();
        self.buffer.text(&start, &end, false).to_string()
    }
}

fn placeholder(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Chat => "Type your message (Shift+Enter for new line)",
        InputMode::Query => "Ask a question about your records",
    }
}
