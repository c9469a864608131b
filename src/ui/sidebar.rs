use adw::prelude::*;
use relm4::factory::FactoryVecDeque;
use relm4::prelude::*;

use crate::models::ConversationSummary;

#[derive(Debug)]
pub struct ConversationRow {
    pub conversation: ConversationSummary,
}

#[relm4::factory(pub)]
impl FactoryComponent for ConversationRow {
    type Init = ConversationSummary;
    type Input = ();
    type Output = ();
    type CommandOutput = ();
    type ParentWidget = gtk::ListBox;

    view! {
        gtk::Box {
            set_orientation: gtk::Orientation::Horizontal,
            set_spacing: 6,
            set_margin_all: 6,
        }
    }

    fn init_model(conversation: Self::Init, _index: &DynamicIndex, _sender: FactorySender<Self>) -> Self {
        Self { conversation }
    }

    fn init_widgets(
        &mut self,
        _index: &DynamicIndex,
        root: Self::Root,
        _returned_widget: &<Self::ParentWidget as relm4::factory::FactoryView>::ReturnedWidget,
        _sender: FactorySender<Self>,
    ) -> Self::Widgets {
        let text_box = gtk::Box::builder()
            .orientation(gtk::Orientation::Vertical)
            .spacing(2)
            .hexpand(true)
            .build();

        let title_label = gtk::Label::builder()
            .label(self.conversation.display_title())
            .halign(gtk::Align::Start)
            .ellipsize(gtk::pango::EllipsizeMode::End)
            .max_width_chars(30)
            .build();
        title_label.add_css_class("heading");
        text_box.append(&title_label);

        if !self.conversation.timestamp.is_empty() {
            let time_label = gtk::Label::builder()
                .label(self.conversation.timestamp.as_str())
                .halign(gtk::Align::Start)
                .ellipsize(gtk::pango::EllipsizeMode::End)
                .build();
            time_label.add_css_class("dim-label");
            time_label.add_css_class("caption");
            text_box.append(&time_label);
        }

        root.append(&text_box);

        if self.conversation.is_current {
            root.add_css_class("current-conversation");
            let marker = gtk::Image::from_icon_name("object-select-symbolic");
            marker.set_tooltip_text(Some("Current conversation"));
            marker.set_valign(gtk::Align::Center);
            root.append(&marker);
        }

        let widgets = view_output!();
        widgets
    }
}

pub struct Sidebar {
    conversations: FactoryVecDeque<ConversationRow>,
    search_term: String,
    loading: bool,
}

#[derive(Debug)]
pub enum SidebarMsg {
    LoadConversations(Vec<ConversationSummary>),
    SetLoading(bool),
    NewConversation,
    Refresh,
    RowActivated(usize),
    SearchChanged(String),
}

#[derive(Debug)]
pub enum SidebarOutput {
    NewConversation,
    Refresh,
    SwitchConversation(String),
}

#[relm4::component(pub)]
impl Component for Sidebar {
    type Init = ();
    type Input = SidebarMsg;
    type Output = SidebarOutput;
    type CommandOutput = ();

    view! {
        adw::ToolbarView {
            add_top_bar = &adw::HeaderBar {
                set_show_end_title_buttons: false,

                pack_start = &gtk::Button {
                    set_icon_name: "list-add-symbolic",
                    set_tooltip_text: Some("New Conversation (Ctrl+N)"),
                    connect_clicked => SidebarMsg::NewConversation,
                },

                pack_end = &gtk::Button {
                    set_icon_name: "view-refresh-symbolic",
                    set_tooltip_text: Some("Refresh Conversations"),
                    #[watch]
                    set_sensitive: !model.loading,
                    connect_clicked => SidebarMsg::Refresh,
                },

                #[wrap(Some)]
                set_title_widget = &adw::WindowTitle {
                    set_title: "Conversations",
                },
            },

            #[wrap(Some)]
            set_content = &gtk::Box {
                set_orientation: gtk::Orientation::Vertical,
                set_spacing: 0,

                gtk::SearchEntry {
                    set_placeholder_text: Some("Search conversations..."),
                    set_margin_start: 8,
                    set_margin_end: 8,
                    set_margin_top: 4,
                    set_margin_bottom: 4,
                    connect_search_changed[sender] => move |entry| {
                        sender.input(SidebarMsg::SearchChanged(entry.text().to_string()));
                    },
                },

                gtk::Overlay {
                    set_vexpand: true,

                    gtk::ScrolledWindow {
                        set_hscrollbar_policy: gtk::PolicyType::Never,
                        set_vexpand: true,

                        #[local_ref]
                        conversation_list -> gtk::ListBox {
                            set_selection_mode: gtk::SelectionMode::Single,
                            add_css_class: "navigation-sidebar",
                        },
                    },

                    add_overlay = &gtk::Label {
                        set_label: "No conversations yet",
                        set_valign: gtk::Align::Center,
                        set_can_target: false,
                        add_css_class: "dim-label",
                        #[watch]
                        set_visible: model.conversations.is_empty() && !model.loading,
                    },
                },
            },
        }
    }

    fn init(
        _init: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let conversations = FactoryVecDeque::builder()
            .launch(gtk::ListBox::default())
            .detach();

        let model = Self {
            conversations,
            search_term: String::new(),
            loading: false,
        };

        let conversation_list = model.conversations.widget();
        let widgets = view_output!();

        let sender_row = sender.clone();
        model
            .conversations
            .widget()
            .connect_row_activated(move |_, row| {
                if let Ok(index) = usize::try_from(row.index()) {
                    sender_row.input(SidebarMsg::RowActivated(index));
                }
            });

        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            SidebarMsg::LoadConversations(conversations) => {
                self.loading = false;
                let current = conversations.iter().position(|c| c.is_current);

                let mut guard = self.conversations.guard();
                guard.clear();
                for conversation in conversations {
                    guard.push_back(conversation);
                }
                drop(guard);

                let list = self.conversations.widget();
                match current.and_then(|i| list.row_at_index(i as i32)) {
                    Some(row) => list.select_row(Some(&row)),
                    None => list.unselect_all(),
                }
                self.apply_search_filter();
            }
            SidebarMsg::SetLoading(loading) => {
                self.loading = loading;
            }
            SidebarMsg::NewConversation => {
                let _ = sender.output(SidebarOutput::NewConversation);
            }
            SidebarMsg::Refresh => {
                let _ = sender.output(SidebarOutput::Refresh);
            }
            SidebarMsg::RowActivated(index) => {
                let target = self
                    .conversations
                    .get(index)
                    .filter(|row| !row.conversation.is_current)
                    .map(|row| row.conversation.id.clone());
                if let Some(id) = target {
                    let _ = sender.output(SidebarOutput::SwitchConversation(id));
                }
            }
            SidebarMsg::SearchChanged(term) => {
                self.search_term = term.to_lowercase();
                self.apply_search_filter();
            }
        }
    }
}

impl Sidebar {
    fn apply_search_filter(&self) {
        let list_widget = self.conversations.widget();
        for (i, row) in self.conversations.iter().enumerate() {
            let visible = self.search_term.is_empty()
                || row
                    .conversation
                    .display_title()
                    .to_lowercase()
                    .contains(&self.search_term);
            if let Some(widget) = list_widget.row_at_index(i as i32) {
                widget.set_visible(visible);
            }
        }
    }
}
