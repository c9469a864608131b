use adw::prelude::*;
use relm4::prelude::*;

use crate::api::client::{normalize_base_url, same_server};
use crate::api::ApiError;

pub struct ConnectionPage {
    server_url: String,
    error: Option<String>,
}

#[derive(Debug)]
pub enum ConnectionPageMsg {
    Apply(String),
}

#[derive(Debug)]
pub enum ConnectionPageOutput {
    ServerUrlChanged(String),
}

#[relm4::component(pub)]
impl Component for ConnectionPage {
    type Init = String;
    type Input = ConnectionPageMsg;
    type Output = ConnectionPageOutput;
    type CommandOutput = ();

    view! {
        adw::PreferencesPage {
            set_title: "Connection",
            set_icon_name: Some("network-server-symbolic"),

            adw::PreferencesGroup {
                set_title: "Assistant Server",
                set_description: Some("Address of the chat server. Press Enter or the apply button to reconnect."),

                adw::EntryRow {
                    set_title: "Server address",
                    set_text: &model.server_url,
                    set_show_apply_button: true,
                    connect_apply[sender] => move |row| {
                        sender.input(ConnectionPageMsg::Apply(row.text().to_string()));
                    },
                },

                gtk::Label {
                    set_halign: gtk::Align::Start,
                    set_margin_top: 6,
                    set_wrap: true,
                    add_css_class: "error",
                    add_css_class: "caption",
                    #[watch]
                    set_label: model.error.as_deref().unwrap_or(""),
                    #[watch]
                    set_visible: model.error.is_some(),
                },
            },
        }
    }

    fn init(
        server_url: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let model = Self {
            server_url,
            error: None,
        };
        let widgets = view_output!();
        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            ConnectionPageMsg::Apply(text) => match changed_server(&self.server_url, &text) {
                Ok(Some(url)) => {
                    self.error = None;
                    self.server_url = url.clone();
                    let _ = sender.output(ConnectionPageOutput::ServerUrlChanged(url));
                }
                Ok(None) => {
                    self.error = None;
                }
                Err(e) => {
                    self.error = Some(e.to_string());
                }
            },
        }
    }
}

/// Normalize an entered address. `Ok(None)` means it names the server in use.
fn changed_server(current: &str, text: &str) -> Result<Option<String>, ApiError> {
    let url = normalize_base_url(text)?;
    if same_server(current, url.as_str()) {
        Ok(None)
    } else {
        Ok(Some(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_the_stored_address_is_not_a_change() {
        assert!(matches!(
            changed_server("http://127.0.0.1:5000", "http://127.0.0.1:5000"),
            Ok(None)
        ));
        assert!(matches!(changed_server("http://127.0.0.1:5000", "127.0.0.1:5000/"), Ok(None)));
    }

    #[test]
    fn a_new_address_comes_back_normalized() {
        match changed_server("http://127.0.0.1:5000", "hr.internal:8080") {
            Ok(Some(url)) => assert_eq!(url, "http://hr.internal:8080/"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(changed_server("http://127.0.0.1:5000", " ").is_err());
    }
}
