use gtk::prelude::*;
use relm4::prelude::*;

use crate::models::{ChatMessage, Sender};
use crate::services::markdown::{self, Block};

const AVATAR_SIZE: i32 = 32;

pub struct MessageWidget {
    pub message: ChatMessage,
    row: gtk::Box,
}

#[derive(Debug)]
pub enum MessageWidgetMsg {
    SetMaxWidth(i32),
}

#[relm4::factory(pub)]
impl FactoryComponent for MessageWidget {
    type Init = ChatMessage;
    type Input = MessageWidgetMsg;
    type Output = ();
    type CommandOutput = ();
    type ParentWidget = gtk::Box;

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Vertical,
            set_spacing: 0,
        }
    }

    fn init_model(message: Self::Init, _index: &DynamicIndex, _sender: FactorySender<Self>) -> Self {
        let is_user = message.sender == Sender::User;
        let row = gtk::Box::builder()
            .orientation(gtk::Orientation::Horizontal)
            .spacing(8)
            .margin_top(4)
            .margin_bottom(4)
            .margin_start(12)
            .margin_end(12)
            .halign(if is_user {
                gtk::Align::End
            } else {
                gtk::Align::Start
            })
            .build();
        row.add_css_class("message");
        row.add_css_class(message.sender.as_str());

        Self { message, row }
    }

    fn init_widgets(
        &mut self,
        _index: &DynamicIndex,
        root: Self::Root,
        _returned_widget: &<Self::ParentWidget as relm4::factory::FactoryView>::ReturnedWidget,
        _sender: FactorySender<Self>,
    ) -> Self::Widgets {
        let is_user = self.message.sender == Sender::User;

        if !is_user {
            let avatar = adw::Avatar::new(AVATAR_SIZE, Some(Sender::Assistant.display_name()), true);
            avatar.set_valign(gtk::Align::Start);
            avatar.add_css_class("avatar");
            self.row.append(&avatar);
        }

        let content = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(2)
            .build();
        content.add_css_class("message-content");

        let bubble = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(6)
            .margin_start(0)
            .build();
        bubble.add_css_class("card");
        bubble.add_css_class(if is_user {
            "message-bubble-user"
        } else {
            "message-bubble-assistant"
        });

        let text_box = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(6)
            .margin_start(12)
            .margin_end(12)
            .margin_top(8)
            .margin_bottom(8)
            .build();

        if is_user {
            let label = gtk::Label::builder()
                .label(self.message.text.as_str())
                .halign(gtk::Align::Start)
                .xalign(0.0)
                .wrap(true)
                .wrap_mode(gtk::pango::WrapMode::WordChar)
                .selectable(true)
                .build();
            text_box.append(&label);
        } else {
            for block in markdown::render(&self.message.text) {
                text_box.append(&block_to_widget(&block));
            }
        }

        bubble.append(&text_box);
        content.append(&bubble);

        let timestamp = gtk::Label::builder()
            .label(self.message.time_label())
            .halign(if is_user {
                gtk::Align::End
            } else {
                gtk::Align::Start
            })
            .margin_start(4)
            .margin_end(4)
            .build();
        timestamp.add_css_class("caption");
        timestamp.add_css_class("dim-label");
        timestamp.add_css_class("message-timestamp");
        content.append(&timestamp);

        self.row.append(&content);
        root.append(&self.row);

        let widgets = view_output!();
        widgets
    }

    fn update(&mut self, msg: Self::Input, _sender: FactorySender<Self>) {
        match msg {
            MessageWidgetMsg::SetMaxWidth(width) => {
                // Keep bubbles off the far edge on wide windows.
                if self.message.sender == Sender::User {
                    self.row.set_margin_start(12_i32.max(width * 25 / 100));
                    self.row.set_margin_end(12);
                } else {
                    self.row.set_margin_start(12);
                    self.row.set_margin_end(12_i32.max(width * 15 / 100));
                }
            }
        }
    }
}

fn block_to_widget(block: &Block) -> gtk::Widget {
    match block {
        Block::Markup(markup) => {
            let label = gtk::Label::builder()
                .halign(gtk::Align::Start)
                .xalign(0.0)
                .wrap(true)
                .wrap_mode(gtk::pango::WrapMode::WordChar)
                .selectable(true)
                .use_markup(true)
                .build();
            label.set_markup(markup);
            label.upcast()
        }
        Block::Code { language, code } => {
            let frame = gtk::Box::builder()
                .orientation(gtk::Orientation::Vertical)
                .spacing(2)
                .build();
            frame.add_css_class("code-block");

            if let Some(language) = language {
                let lang_label = gtk::Label::builder()
                    .label(language.as_str())
                    .halign(gtk::Align::Start)
                    .build();
                lang_label.add_css_class("caption");
                lang_label.add_css_class("dim-label");
                frame.append(&lang_label);
            }

            let code_label = gtk::Label::builder()
                .label(code.as_str())
                .halign(gtk::Align::Start)
                .xalign(0.0)
                .selectable(true)
                .build();
            code_label.add_css_class("monospace");
            code_label.add_css_class("query-rows");

            let scroller = gtk::ScrolledWindow::builder()
                .hscrollbar_policy(gtk::PolicyType::Automatic)
                .vscrollbar_policy(gtk::PolicyType::Never)
                .propagate_natural_height(true)
                .propagate_natural_width(true)
                .child(&code_label)
                .build();
            frame.append(&scroller);

            frame.upcast()
        }
    }
}
