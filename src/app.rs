use eframe::egui;
use log::info;

use crate::config::{FavoritesConfig, MapConfig};
use crate::geolocation::GeolocationRequest;
use crate::view::{FavoritesView, Phase};

/// Hosts a [`FavoritesView`] in an eframe window, backed by eframe's persistent storage.
pub struct FavoritesApp {
    view: FavoritesView,
}

impl FavoritesApp {
    /// Creates the application, loading the saved favorites and starting the position lookup.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        map_config: impl MapConfig + 'static,
        config: FavoritesConfig,
    ) -> Self {
        let geolocation = GeolocationRequest::from_config(&config);
        let mut view = FavoritesView::new(map_config, config);
        view.mount(cc.storage, geolocation);
        info!("Loaded {} favorites", view.favorites().len());
        Self { view }
    }

    /// The hosted view.
    pub fn view(&self) -> &FavoritesView {
        &self.view
    }
}

impl eframe::App for FavoritesApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.view.teardown();
        }
        if self.view.phase() == Phase::TornDown {
            return;
        }

        self.view.show(ctx, frame.storage_mut());
    }
}
