use adw::prelude::*;
use relm4::prelude::*;

pub struct AppearancePage {
    dark_mode: bool,
}

#[derive(Debug)]
pub enum AppearancePageMsg {
    DarkModeToggled(bool),
}

#[derive(Debug)]
pub enum AppearancePageOutput {
    DarkModeChanged(bool),
}

#[relm4::component(pub)]
impl Component for AppearancePage {
    type Init = bool;
    type Input = AppearancePageMsg;
    type Output = AppearancePageOutput;
    type CommandOutput = ();

    view! {
        adw::PreferencesPage {
            set_title: "Appearance",
            set_icon_name: Some("applications-graphics-symbolic"),

            adw::PreferencesGroup {
                set_title: "Theme",

                adw::SwitchRow {
                    set_title: "Dark mode",
                    set_subtitle: "Use the dark color scheme",
                    set_active: model.dark_mode,
                    connect_active_notify[sender] => move |row| {
                        sender.input(AppearancePageMsg::DarkModeToggled(row.is_active()));
                    },
                },
            },
        }
    }

    fn init(
        dark_mode: Self::Init,
        root: Self::Root,
        sender: ComponentSender<Self>,
    ) -> ComponentParts<Self> {
        let model = Self { dark_mode };
        let widgets = view_output!();
        ComponentParts { model, widgets }
    }

    fn update(&mut self, msg: Self::Input, sender: ComponentSender<Self>, _root: &Self::Root) {
        match msg {
            AppearancePageMsg::DarkModeToggled(active) => {
                if self.dark_mode == active {
                    return;
                }
                self.dark_mode = active;

                // Apply immediately
                apply_dark_mode(active);
                let _ = sender.output(AppearancePageOutput::DarkModeChanged(active));
            }
        }
    }
}

pub fn apply_dark_mode(dark_mode: bool) {
    let style_manager = adw::StyleManager::default();
    style_manager.set_color_scheme(if dark_mode {
        adw::ColorScheme::ForceDark
    } else {
        adw::ColorScheme::ForceLight
    });
}
