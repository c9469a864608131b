mod api;
mod app;
mod config;
mod models;
mod services;
mod ui;

use gtk::prelude::*;
use relm4::prelude::*;
use tracing_subscriber::EnvFilter;

use app::App;
use config::APP_ID;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let app = adw::Application::builder().application_id(APP_ID).build();

    app.connect_startup(|_| {
        let resource_bytes = glib::Bytes::from_static(include_bytes!(concat!(
            env!("OUT_DIR"),
            "/parley.gresource"
        )));
        match gio::Resource::from_data(&resource_bytes) {
            Ok(resource) => gio::resources_register(&resource),
            Err(e) => {
                tracing::error!("Failed to load GResource: {}", e);
                return;
            }
        }

        let Some(display) = gtk::gdk::Display::default() else {
            tracing::error!("No default display; skipping stylesheet");
            return;
        };

        let provider = gtk::CssProvider::new();
        provider.load_from_resource(&format!("{}/style.css", config::RESOURCE_PREFIX));
        gtk::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    });

    RelmApp::from_app(app).run_async::<App>(());
}
