use std::cell::Cell;
use std::rc::Rc;

use gtk::prelude::*;
use relm4::factory::FactoryVecDeque;
use relm4::prelude::*;

use crate::models::ChatMessage;
use crate::services::settings::InputMode;
use crate::ui::input_area::{InputArea, InputAreaMsg, InputAreaOutput};
use crate::ui::message_widget::{MessageWidget, MessageWidgetMsg};

pub struct ChatView {
    messages: FactoryVecDeque<MessageWidget>,
    input_area: Controller<InputArea>,
    typing: bool,
    scrolled_window: gtk::ScrolledWindow,
    user_scrolled_up: bool,
    container_width: i32,
}

#[derive(Debug)]
pub enum ChatViewMsg {
    AddMessage(ChatMessage),
    LoadMessages(Vec<ChatMessage>),
    Clear,
    /// Show the typing indicator and lock the input while a reply is pending.
    SetTyping(bool),
    SetListening(bool),
    SetMode(InputMode),
    SetInputText(String),
    ScrollToBottom,
    // Internal
    ScrollPositionChanged,
    ContainerWidthChanged(i32),
    UserSubmitted(String),
    DictationRequested,
}

#[derive(Debug)]
pub enum ChatViewOutput {
    Submit(String),
    Dictate,
}

#[relm4::component(pub)]
impl Component for ChatView {
    type Init = InputMode;
    type Input = ChatViewMsg;
    type Output = ChatViewOutput;
    type CommandOutput = ();

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Vertical,
            set_vexpand: true,

            gtk::Overlay {
                set_vexpand: true,

                #[local_ref]
                scrolled_window -> gtk::ScrolledWindow {
                    set_vexpand: true,
                    set_hscrollbar_policy: gtk::PolicyType::Never,

                    gtk::Box {
                        set_orientation: gtk::Orientation::Vertical,
                        set_margin_top: 8,
                        set_margin_bottom: 8,
                        set_margin_start: 16,
                        set_margin_end: 16,

                        #[local_ref]
                        message_list -> gtk::Box {
                            set_orientation: gtk::Orientation::Vertical,
                            set_spacing: 0,
                        },

                        gtk::Box {
                            set_orientation: gtk::Orientation::Horizontal,
                            set_halign: gtk::Align::Start,
                            set_margin_start: 12,
                            set_margin_top: 4,
                            set_spacing: 8,
                            add_css_class: "typing-indicator",
                            #[watch]
                            set_visible: model.typing,

                            gtk::Spinner {
                                #[watch]
                                set_spinning: model.typing,
                            },

                            gtk::Label {
                                set_label: "Assistant is typing...",
                                add_css_class: "dim-label",
                            },
                        },
                    },
                },

                add_overlay = &adw::StatusPage {
                    set_icon_name: Some("user-available-symbolic"),
                    set_title: "Start a conversation",
                    set_description: Some("Type a message below to talk to the assistant"),
                    set_can_target: false,
                    #[watch]
                    set_visible: model.messages.is_empty() && !model.typing,
                },

                add_overlay = &gtk::Button {
                    set_icon_name: "go-down-symbolic",
                    set_tooltip_text: Some("Scroll to bottom"),
                    set_halign: gtk::Align::Center,
                    set_valign: gtk::Align::End,
                    set_margin_bottom: 8,
                    add_css_class: "circular",
                    add_css_class: "osd",
                    #[watch]
                    set_visible: model.user_scrolled_up,
                    connect_clicked => ChatViewMsg::ScrollToBottom,
                },
            },

            gtk::Separator {
                set_orientation: gtk::Orientation::Horizontal,
            },

            model.input_area.widget().clone(),
        }
    }

    fn init(
        mode: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let messages = FactoryVecDeque::builder()
            .launch(gtk::Box::default())
            .detach();

        let input_area = InputArea::builder()
            .launch(mode)
            .forward(sender.input_sender(), |output| match output {
                InputAreaOutput::Submit(text) => ChatViewMsg::UserSubmitted(text),
                InputAreaOutput::Dictate => ChatViewMsg::DictationRequested,
            });

        let scrolled_window = gtk::ScrolledWindow::new();

        let model = Self {
            messages,
            input_area,
            typing: false,
            scrolled_window: scrolled_window.clone(),
            user_scrolled_up: false,
            container_width: 0,
        };

        let message_list = model.messages.widget();
        let widgets = view_output!();

        let sender_scroll = sender.clone();
        scrolled_window
            .vadjustment()
            .connect_value_changed(move |_| {
                sender_scroll.input(ChatViewMsg::ScrollPositionChanged);
            });

        // Bubble margins follow the available width
        let sender_resize = sender.clone();
        let last_width = Rc::new(Cell::new(0));
        scrolled_window.add_tick_callback(move |widget, _| {
            let w = widget.width();
            if w > 0 && w != last_width.get() {
                last_width.set(w);
                sender_resize.input(ChatViewMsg::ContainerWidthChanged(w));
            }
            glib::ControlFlow::Continue
        });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            ChatViewMsg::AddMessage(message) => {
                let mut guard = self.messages.guard();
                let idx = guard.push_back(message).current_index();
                if self.container_width > 0 {
                    guard.send(idx, MessageWidgetMsg::SetMaxWidth(self.container_width));
                }
                drop(guard);
                // A fresh message always brings the view to the bottom.
                sender.input(ChatViewMsg::ScrollToBottom);
            }
            ChatViewMsg::LoadMessages(messages) => {
                let mut guard = self.messages.guard();
                guard.clear();
                for message in messages {
                    guard.push_back(message);
                }
                if self.container_width > 0 {
                    for i in 0..guard.len() {
                        guard.send(i, MessageWidgetMsg::SetMaxWidth(self.container_width));
                    }
                }
                drop(guard);
                sender.input(ChatViewMsg::ScrollToBottom);
            }
            ChatViewMsg::Clear => {
                self.messages.guard().clear();
                self.user_scrolled_up = false;
            }
            ChatViewMsg::SetTyping(typing) => {
                self.typing = typing;
                self.input_area.emit(InputAreaMsg::SetSending(typing));
                if typing {
                    sender.input(ChatViewMsg::ScrollToBottom);
                }
            }
            ChatViewMsg::SetListening(listening) => {
                self.input_area.emit(InputAreaMsg::SetListening(listening));
            }
            ChatViewMsg::SetMode(mode) => {
                self.input_area.emit(InputAreaMsg::SetMode(mode));
            }
            ChatViewMsg::SetInputText(text) => {
                self.input_area.emit(InputAreaMsg::SetText(text));
            }
            ChatViewMsg::ScrollToBottom => {
                self.user_scrolled_up = false;
                let adj = self.scrolled_window.vadjustment();
                glib::idle_add_local_once(move || {
                    adj.set_value(adj.upper());
                });
            }
            ChatViewMsg::ScrollPositionChanged => {
                let adj = self.scrolled_window.vadjustment();
                let at_bottom = adj.value() >= adj.upper() - adj.page_size() - 50.0;
                self.user_scrolled_up = !at_bottom;
            }
            ChatViewMsg::ContainerWidthChanged(width) => {
                if self.container_width != width {
                    self.container_width = width;
                    let guard = self.messages.guard();
                    for i in 0..guard.len() {
                        guard.send(i, MessageWidgetMsg::SetMaxWidth(width));
                    }
                }
            }
            ChatViewMsg::UserSubmitted(text) => {
                let _ = sender.output(ChatViewOutput::Submit(text));
            }
            ChatViewMsg::DictationRequested => {
                let _ = sender.output(ChatViewOutput::Dictate);
            }
        }
    }
}
