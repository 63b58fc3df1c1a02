//! The favorites map view: a map to pick places on, a form to name them, and the saved list.
//!
//! The view moves through [`Phase`]s. It is `Uninitialized` until [`FavoritesView::mount`]
//! loads the saved favorites and takes the position lookup; it stays `Ready` until that lookup
//! settles, and only then becomes `Interactive` and accepts picks on the map. Because the saved
//! favorites are always loaded before the lookup result is applied, the two never race for the
//! map.

use std::time::Duration;

use eframe::egui;
use egui::{Context, RichText, ScrollArea, TextEdit};
use log::{debug, warn};

use crate::Map;
use crate::config::{FavoritesConfig, MapConfig, MarkerStyle};
use crate::favorites::{FavoriteId, FavoritesStore};
use crate::geolocation::GeolocationRequest;
use crate::layers::marker::MarkerLayer;
use crate::notify::Notifications;
use crate::projection::GeoPos;
use crate::selection::{DISPLAY_DECIMALS, Selection};
use crate::storage::KeyValueStore;

/// Key of the layer holding one pin per favorite.
pub const FAVORITES_LAYER: &str = "favorites";

/// Key of the layer holding the located position.
pub const LOCATION_LAYER: &str = "location";

/// The lifecycle of a [`FavoritesView`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Not mounted yet.
    Uninitialized,

    /// Mounted, waiting for the position lookup.
    Ready,

    /// Accepting picks on the map.
    Interactive,

    /// Torn down; the map has no layers left.
    TornDown,
}

/// The favorites map view.
pub struct FavoritesView {
    map: Map,
    favorites: FavoritesStore,
    selection: Selection,
    notifications: Notifications,
    geolocation: Option<GeolocationRequest>,
    config: FavoritesConfig,
    phase: Phase,
}

impl FavoritesView {
    /// Creates an unmounted view over a map built from `map_config`.
    pub fn new(map_config: impl MapConfig + 'static, config: FavoritesConfig) -> Self {
        Self {
            map: Map::new(map_config),
            favorites: FavoritesStore::new(&config.storage_key, &config.default_label_prefix),
            selection: Selection::default(),
            notifications: Notifications::new(config.toast_duration),
            geolocation: None,
            config,
            phase: Phase::Uninitialized,
        }
    }

    /// Loads the saved favorites from `storage` and takes over the position lookup.
    pub fn mount<S: KeyValueStore + ?Sized>(
        &mut self,
        storage: Option<&S>,
        geolocation: GeolocationRequest,
    ) {
        if self.phase != Phase::Uninitialized {
            warn!("Favorites view is already mounted");
            return;
        }

        let mut markers = MarkerLayer::new(self.map.config().marker_style());
        self.favorites.hydrate(storage, &mut markers);
        self.map.add_layer(FAVORITES_LAYER, markers);
        self.map
            .add_layer(LOCATION_LAYER, MarkerLayer::new(MarkerStyle::location()));

        self.geolocation = Some(geolocation);
        self.set_phase(Phase::Ready);
        self.settle();
    }

    /// Processes the events of one frame: applies a finished position lookup and takes the
    /// coordinate picked on the map.
    pub fn update(&mut self) {
        self.settle();
        if let Some(pos) = self.map.take_interaction() {
            self.handle_primary_interaction(pos);
        }
    }

    /// Records a coordinate picked on the map. Ignored unless the view is interactive.
    pub fn handle_primary_interaction(&mut self, pos: GeoPos) {
        if self.phase != Phase::Interactive {
            debug!("Ignoring pick while {:?}", self.phase);
            return;
        }
        self.selection.record(pos);
    }

    /// Saves the picked coordinate under the typed label, then writes the list to `storage`.
    /// Returns `true` if a favorite was added.
    pub fn add_favorite<S: KeyValueStore + ?Sized>(&mut self, storage: Option<&mut S>) -> bool {
        let Some(markers) = self.map.layer_mut::<MarkerLayer>(FAVORITES_LAYER) else {
            debug!("Cannot add a favorite while {:?}", self.phase);
            return false;
        };

        let label = match self.favorites.append(self.selection.pos(), &self.selection.label, markers) {
            Ok(favorite) => favorite.label.clone(),
            Err(e) => {
                warn!("Rejected favorite: {}", e);
                self.notifications.error(e.to_string());
                return false;
            }
        };
        self.selection.clear();
        self.selection.take_label();

        match storage {
            Some(storage) => {
                if let Err(e) = self.favorites.persist(storage) {
                    self.notifications
                        .error(format!("Could not save favorites: {}", e));
                    return true;
                }
            }
            None => debug!("No storage available, favorites are kept for this session only"),
        }

        self.notifications.success(format!("Added \"{}\" to favorites", label));
        true
    }

    /// Centers the map on a favorite and opens its popup. Returns `false` for unknown ids.
    pub fn select_favorite(&mut self, id: FavoriteId) -> bool {
        let Some(favorite) = self.favorites.get(id) else {
            return false;
        };
        let (pos, marker) = (favorite.pos, favorite.marker);

        self.map.recenter(pos, self.config.select_zoom);
        if let Some(markers) = self.map.layer_mut::<MarkerLayer>(FAVORITES_LAYER) {
            markers.open_popup(marker);
        }
        true
    }

    /// Releases the map layers. A position lookup still in flight is left to finish on its own.
    pub fn teardown(&mut self) {
        match self.phase {
            Phase::Interactive => {}
            Phase::Ready => debug!("Tearing down before the position lookup settled"),
            Phase::Uninitialized | Phase::TornDown => return,
        }
        self.map.clear_layers();
        self.geolocation = None;
        self.set_phase(Phase::TornDown);
    }

    /// Draws the side panel, the map and the toasts, and handles their input.
    pub fn show<S: KeyValueStore + ?Sized>(&mut self, ctx: &Context, storage: Option<&mut S>) {
        let mut add_clicked = false;
        let mut selected = None;

        egui::SidePanel::left("favorites_panel")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Favorites");
                ui.add_space(4.0);

                ui.label("Name");
                ui.add(TextEdit::singleline(&mut self.selection.label).hint_text("Marker name"));

                match self.selection.display() {
                    Some(pos) => {
                        let decimals = DISPLAY_DECIMALS as usize;
                        ui.label(format!("Latitude: {:.*}", decimals, pos.lat));
                        ui.label(format!("Longitude: {:.*}", decimals, pos.lon));
                    }
                    None => {
                        ui.label(RichText::new("Click the map to pick a place").weak());
                    }
                }

                add_clicked = ui.button("Add favorite").clicked();
                ui.separator();

                ScrollArea::vertical().show(ui, |ui| {
                    if self.favorites.is_empty() {
                        ui.label(RichText::new("No favorites yet").weak());
                    }
                    for favorite in self.favorites.display_order(self.config.newest_first) {
                        if ui.selectable_label(false, &favorite.label).clicked() {
                            selected = Some(favorite.id);
                        }
                    }
                });
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                ui.add(&mut self.map);
            });

        if add_clicked {
            self.add_favorite(storage);
        }
        if let Some(id) = selected {
            self.select_favorite(id);
        }
        self.update();
        self.notifications.show(ctx);

        if self.phase == Phase::Ready {
            // Keep polling the position lookup.
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The map.
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// The map, mutably.
    pub fn map_mut(&mut self) -> &mut Map {
        &mut self.map
    }

    /// The saved favorites.
    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    /// The pending selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The pending selection, mutably.
    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    /// The toasts on screen.
    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    /// The view settings.
    pub fn config(&self) -> &FavoritesConfig {
        &self.config
    }

    /// Moves to `Interactive` once the position lookup settled, applying its outcome first.
    fn settle(&mut self) {
        if self.phase != Phase::Ready {
            return;
        }
        let Some(request) = self.geolocation.as_mut() else {
            self.set_phase(Phase::Interactive);
            return;
        };

        match request.poll() {
            Some(Ok(pos)) => {
                self.map.recenter(pos, self.config.locate_zoom);
                if self.config.mark_location {
                    if let Some(layer) = self.map.layer_mut::<MarkerLayer>(LOCATION_LAYER) {
                        layer.clear();
                        layer.place(pos, "You are here");
                    }
                }
                self.notifications.success("Showing your current location");
            }
            Some(Err(e)) => {
                self.notifications
                    .error(format!("Could not get your location: {}", e));
            }
            None => return,
        }

        self.geolocation = None;
        self.set_phase(Phase::Interactive);
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!("Favorites view: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}
