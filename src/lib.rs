#![warn(missing_docs)]

//! A map of favorite places for `egui`.
//!
//! The crate provides a `Map` widget that displays tiles from a tile server, supports panning
//! and zooming, and reports the coordinate the user picked. On top of it, [`view::FavoritesView`]
//! keeps a list of labeled favorites that is persisted in the application's key-value storage.
//!
//! # Example
//!
//! ```no_run
//! use eframe::egui;
//! use geogems::{Map, config::OpenStreetMapConfig};
//!
//! struct MyApp {
//!     map: Map,
//! }
//!
//! impl Default for MyApp {
//!     fn default() -> Self {
//!         Self {
//!             map: Map::new(OpenStreetMapConfig::default()),
//!         }
//!     }
//! }
//!
//! impl eframe::App for MyApp {
//!     fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
//!         egui::CentralPanel::default()
//!             .frame(egui::Frame::NONE)
//!             .show(ctx, |ui| {
//!                 ui.add(&mut self.map);
//!             });
//!         if let Some(pos) = self.map.take_interaction() {
//!             println!("{}, {}", pos.lat, pos.lon);
//!         }
//!     }
//! }
//! ```

/// The eframe application hosting the favorites view.
pub mod app;
/// Configuration traits and types for the map widget.
pub mod config;
/// The persisted list of favorite places.
pub mod favorites;
/// One-shot lookup of the current position.
pub mod geolocation;
/// Layers drawn on top of the map.
pub mod layers;
/// Toast notifications.
pub mod notify;
/// Conversion between geographical and screen coordinates.
pub mod projection;
/// The pending coordinate selection.
pub mod selection;
/// Key-value storage backends.
pub mod storage;
/// The favorites map view component.
pub mod view;

use eframe::egui;
use egui::{Color32, Rect, Response, Sense, Ui, Vec2, Widget, pos2};
use eyre::{Context, Result};
use log::{debug, error};
use once_cell::sync::Lazy;
use poll_promise::Promise;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Interaction, MapConfig};
use crate::layers::Layer;
use crate::projection::{GeoPos, MapProjection};

// The size of a map tile in pixels.
pub(crate) const TILE_SIZE: u32 = 256;
/// The minimum zoom level.
pub const MIN_ZOOM: u8 = 0;
/// The maximum zoom level.
pub const MAX_ZOOM: u8 = 19;

// Reuse the reqwest client for all downloads by making it a static variable.
pub(crate) static CLIENT: Lazy<reqwest::blocking::Client> = Lazy::new(|| {
    reqwest::blocking::Client::builder()
        .user_agent(format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .expect("Failed to build reqwest client")
});

/// Errors that can occur while using the map widget.
#[derive(Error, Debug)]
pub enum MapError {
    /// An error occurred while making a web request.
    #[error("Connection error")]
    ConnectionError(#[from] reqwest::Error),

    /// A map tile failed to download.
    #[error("A map tile failed to download. HTTP Status: `{0}`")]
    TileDownloadError(String),

    /// The downloaded tile bytes could not be converted to an image.
    #[error("Unable to convert downloaded map tile bytes as image")]
    TileBytesConversionError(#[from] image::ImageError),
}

/// A unique identifier for a map tile.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TileId {
    /// The zoom level.
    pub z: u8,

    /// The x-coordinate of the tile.
    pub x: u32,

    /// The y-coordinate of the tile.
    pub y: u32,
}

impl TileId {
    fn to_url(&self, config: &dyn MapConfig) -> String {
        config.tile_url(self)
    }
}

/// The state of a tile in the cache.
pub(crate) enum Tile {
    /// The tile is being downloaded.
    Loading(Promise<Result<egui::ColorImage, Arc<eyre::Report>>>),

    /// The tile is in memory.
    Loaded(egui::TextureHandle),

    /// The tile failed to download.
    Failed(Arc<eyre::Report>),
}

/// The map widget.
pub struct Map {
    /// The geographical center of the map.
    pub center: GeoPos,

    /// The zoom level of the map.
    pub zoom: u8,

    tiles: HashMap<TileId, Tile>,

    layers: Vec<(String, Box<dyn Layer>)>,

    /// The geographical position under the mouse pointer, if any.
    pub mouse_pos: Option<GeoPos>,

    /// The coordinate picked with the configured interaction, until taken.
    interaction: Option<GeoPos>,

    /// Configuration for the map, such as the tile server URL.
    config: Box<dyn MapConfig>,
}

impl Map {
    /// Creates a new `Map` widget.
    ///
    /// # Arguments
    ///
    /// * `config` - A type that implements `MapConfig`, which provides configuration for the map.
    pub fn new<C: MapConfig + 'static>(config: C) -> Self {
        let center = config.default_center();
        let zoom = config.default_zoom().clamp(MIN_ZOOM, MAX_ZOOM);
        Self {
            tiles: HashMap::new(),
            layers: Vec::new(),
            mouse_pos: None,
            interaction: None,
            config: Box::new(config),
            center,
            zoom,
        }
    }

    /// The configuration this map was created with.
    pub fn config(&self) -> &dyn MapConfig {
        self.config.as_ref()
    }

    /// Moves the view to `center` at `zoom`. The zoom is clamped to the supported range.
    pub fn recenter(&mut self, center: GeoPos, zoom: u8) {
        debug!(
            "Recentering map on {:.5}, {:.5} at zoom {}",
            center.lat, center.lon, zoom
        );
        self.center = center;
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Takes the coordinate picked by the user since the last call, if any.
    pub fn take_interaction(&mut self) -> Option<GeoPos> {
        self.interaction.take()
    }

    /// Adds a layer on top of the existing ones. A layer with the same key is replaced.
    pub fn add_layer(&mut self, key: impl Into<String>, layer: impl Layer) {
        let key = key.into();
        let layer: Box<dyn Layer> = Box::new(layer);
        if let Some(slot) = self.layers.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = layer;
        } else {
            self.layers.push((key, layer));
        }
    }

    /// Removes a layer. Returns `true` if it existed.
    pub fn remove_layer(&mut self, key: &str) -> bool {
        let before = self.layers.len();
        self.layers.retain(|(k, _)| k != key);
        self.layers.len() != before
    }

    /// Removes every layer.
    pub fn clear_layers(&mut self) {
        self.layers.clear();
    }

    /// Gets a layer by key, if it exists and has the type `T`.
    pub fn layer<T: Layer>(&self, key: &str) -> Option<&T> {
        self.layers
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, layer)| layer.as_any().downcast_ref::<T>())
    }

    /// Gets a mutable layer by key, if it exists and has the type `T`.
    pub fn layer_mut<T: Layer>(&mut self, key: &str) -> Option<&mut T> {
        self.layers
            .iter_mut()
            .find(|(k, _)| k == key)
            .and_then(|(_, layer)| layer.as_any_mut().downcast_mut::<T>())
    }

    /// Handles user input for panning, zooming and picking a coordinate.
    fn handle_input(&mut self, ui: &Ui, rect: &Rect, response: &Response) {
        // Layers on top get the input first.
        let projection = MapProjection::new(self.zoom, self.center, *rect);
        let mut consumed = false;
        for (_, layer) in self.layers.iter_mut().rev() {
            if layer.handle_input(response, &projection) {
                consumed = true;
                break;
            }
        }

        let picked = match self.config.interaction() {
            Interaction::Click => response.clicked(),
            Interaction::DoubleClick => response.double_clicked(),
        };
        if picked && !consumed {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                let pos = projection.unproject(pointer_pos);
                debug!("Picked {:.5}, {:.5}", pos.lat, pos.lon);
                self.interaction = Some(pos);
            }
        }

        // Handle panning
        if response.dragged() && !consumed {
            let delta = response.drag_delta();
            let center_in_tiles_x = lon_to_x(self.center.lon, self.zoom);
            let center_in_tiles_y = lat_to_y(self.center.lat, self.zoom);

            let mut new_center_x = center_in_tiles_x - (delta.x as f64 / TILE_SIZE as f64);
            let mut new_center_y = center_in_tiles_y - (delta.y as f64 / TILE_SIZE as f64);

            // Clamp the new center to the map boundaries.
            let world_size_in_tiles = 2.0_f64.powi(self.zoom as i32);
            let view_size_in_tiles_x = rect.width() as f64 / TILE_SIZE as f64;
            let view_size_in_tiles_y = rect.height() as f64 / TILE_SIZE as f64;

            let min_center_x = view_size_in_tiles_x / 2.0;
            let max_center_x = world_size_in_tiles - view_size_in_tiles_x / 2.0;
            let min_center_y = view_size_in_tiles_y / 2.0;
            let max_center_y = world_size_in_tiles - view_size_in_tiles_y / 2.0;

            // If the map is smaller than the viewport, center it. Otherwise, clamp the center.
            new_center_x = if min_center_x > max_center_x {
                world_size_in_tiles / 2.0
            } else {
                new_center_x.clamp(min_center_x, max_center_x)
            };
            new_center_y = if min_center_y > max_center_y {
                world_size_in_tiles / 2.0
            } else {
                new_center_y.clamp(min_center_y, max_center_y)
            };

            self.center = GeoPos {
                lon: x_to_lon(new_center_x, self.zoom),
                lat: y_to_lat(new_center_y, self.zoom),
            };
        }

        // Double-click zooms in and centers, unless it is the picking gesture.
        if response.double_clicked()
            && !consumed
            && self.config.interaction() != Interaction::DoubleClick
        {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                let new_zoom = (self.zoom + 1).clamp(MIN_ZOOM, MAX_ZOOM);
                if new_zoom != self.zoom {
                    self.center = projection.unproject(pointer_pos);
                    self.zoom = new_zoom;
                }
            }
        }

        // Handle zooming and mouse position
        if response.hovered() {
            if let Some(mouse_pos) = response.hover_pos() {
                let mouse_rel = mouse_pos - rect.min;
                let widget_center_x = rect.width() as f64 / 2.0;
                let widget_center_y = rect.height() as f64 / 2.0;

                let target = projection.unproject(mouse_pos);
                self.mouse_pos = Some(target);

                let scroll = ui.input(|i| i.raw_scroll_delta.y);
                if scroll != 0.0 {
                    let old_zoom = self.zoom;
                    let mut new_zoom = (self.zoom as i32 + scroll.signum() as i32)
                        .clamp(MIN_ZOOM as i32, MAX_ZOOM as i32)
                        as u8;

                    // If we are zooming out, check if the new zoom level is valid.
                    if scroll < 0.0 {
                        let world_pixel_size = 2.0_f64.powi(new_zoom as i32) * TILE_SIZE as f64;
                        // If the world size would become smaller than the widget size, reject the zoom.
                        if world_pixel_size < rect.width() as f64
                            || world_pixel_size < rect.height() as f64
                        {
                            new_zoom = old_zoom;
                        }
                    }

                    if new_zoom != old_zoom {
                        self.zoom = new_zoom;

                        // Adjust the map center so the geo-coordinate under the mouse remains the
                        // same
                        let new_target_x = lon_to_x(target.lon, new_zoom);
                        let new_target_y = lat_to_y(target.lat, new_zoom);

                        let new_center_x = new_target_x
                            - (mouse_rel.x as f64 - widget_center_x) / TILE_SIZE as f64;
                        let new_center_y = new_target_y
                            - (mouse_rel.y as f64 - widget_center_y) / TILE_SIZE as f64;

                        self.center = GeoPos {
                            lon: x_to_lon(new_center_x, new_zoom),
                            lat: y_to_lat(new_center_y, new_zoom),
                        };
                    }
                }
            } else {
                self.mouse_pos = None;
            }
        } else {
            self.mouse_pos = None;
        }
    }

    /// Draws the map tiles, the layers and the attribution.
    fn draw(&mut self, ui: &mut Ui, rect: &Rect) {
        let painter = ui.painter_at(*rect);
        painter.rect_filled(*rect, 0.0, Color32::from_rgb(220, 220, 220)); // Background

        let projection = MapProjection::new(self.zoom, self.center, *rect);
        let visible: Vec<_> = visible_tiles(&projection).collect();
        for (tile_id, tile_pos) in visible {
            load_tile(&mut self.tiles, self.config.as_ref(), ui.ctx(), tile_id);
            draw_tile(&self.tiles, &painter, &tile_id, tile_pos, Color32::WHITE);
            if matches!(self.tiles.get(&tile_id), Some(Tile::Loading(_))) {
                // The tile is still loading, so we need to tell egui to repaint.
                ui.ctx().request_repaint();
            }
            if let Some(Tile::Failed(e)) = self.tiles.get(&tile_id) {
                let tile_rect =
                    Rect::from_min_size(tile_pos, Vec2::new(TILE_SIZE as f32, TILE_SIZE as f32));
                let response = ui.interact(tile_rect, ui.id().with(tile_id), Sense::hover());
                response.on_hover_text(format!("{}", e));
            }
        }

        for (_, layer) in &self.layers {
            layer.draw(&painter, &projection);
        }

        self.draw_attribution(ui, rect);
    }

    /// Draws the attribution text.
    fn draw_attribution(&self, ui: &mut Ui, rect: &Rect) {
        if let Some(attribution) = self.config.attribution() {
            let bg_color = if ui.visuals().dark_mode {
                Color32::from_black_alpha(150)
            } else {
                Color32::from_white_alpha(150)
            };

            let frame = egui::Frame::NONE
                .inner_margin(egui::Margin::same(5)) // A bit of padding
                .fill(bg_color)
                .corner_radius(3.0);

            egui::Area::new(ui.id().with("attribution"))
                .fixed_pos(rect.left_bottom())
                .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(5.0, -5.0))
                .show(ui.ctx(), |ui| {
                    frame.show(ui, |ui| {
                        ui.style_mut().override_text_style = Some(egui::TextStyle::Small);
                        ui.style_mut().wrap_mode = Some(egui::TextWrapMode::Extend); // Don't wrap attribution text.

                        if let Some(url) = self.config.attribution_url() {
                            ui.hyperlink_to(attribution, url);
                        } else {
                            ui.label(attribution);
                        }
                    });
                });
        }
    }
}

/// Returns an iterator over the tiles covering the projection's widget rectangle.
pub(crate) fn visible_tiles(
    projection: &MapProjection,
) -> impl Iterator<Item = (TileId, egui::Pos2)> + use<> {
    let rect = projection.widget_rect();
    let zoom = projection.zoom();
    let center_x = lon_to_x(projection.center().lon, zoom);
    let center_y = lat_to_y(projection.center().lat, zoom);

    let widget_center_x = rect.width() / 2.0;
    let widget_center_y = rect.height() / 2.0;

    let x_min = (center_x - widget_center_x as f64 / TILE_SIZE as f64).floor() as i32;
    let y_min = (center_y - widget_center_y as f64 / TILE_SIZE as f64).floor() as i32;
    let x_max = (center_x + widget_center_x as f64 / TILE_SIZE as f64).ceil() as i32;
    let y_max = (center_y + widget_center_y as f64 / TILE_SIZE as f64).ceil() as i32;

    // Tiles outside the world are skipped instead of wrapping around.
    let world_size = 2_i64.pow(zoom as u32);
    let rect_min = rect.min;
    (x_min..=x_max)
        .flat_map(move |x| (y_min..=y_max).map(move |y| (x, y)))
        .filter(move |&(x, y)| {
            x >= 0 && y >= 0 && (x as i64) < world_size && (y as i64) < world_size
        })
        .map(move |(x, y)| {
            let tile_id = TileId {
                z: zoom,
                x: x as u32,
                y: y as u32,
            };
            let screen_x = widget_center_x + (x as f64 - center_x) as f32 * TILE_SIZE as f32;
            let screen_y = widget_center_y + (y as f64 - center_y) as f32 * TILE_SIZE as f32;
            let tile_pos = rect_min + Vec2::new(screen_x, screen_y);
            (tile_id, tile_pos)
        })
}

/// Starts downloading a tile if it is not cached, and promotes finished downloads to textures.
pub(crate) fn load_tile(
    tiles: &mut HashMap<TileId, Tile>,
    config: &dyn MapConfig,
    ctx: &egui::Context,
    tile_id: TileId,
) {
    let tile_state = tiles.entry(tile_id).or_insert_with(|| {
        let url = tile_id.to_url(config);
        let promise =
            Promise::spawn_thread("download_tile", move || -> Result<_, Arc<eyre::Report>> {
                let result: Result<_, eyre::Report> = (|| {
                    debug!("Downloading tile from {}", &url);
                    let response = CLIENT.get(&url).send().map_err(MapError::from)?;

                    if !response.status().is_success() {
                        return Err(MapError::TileDownloadError(response.status().to_string()));
                    }

                    let bytes = response.bytes().map_err(MapError::from)?.to_vec();
                    let image = image::load_from_memory(&bytes)
                        .map_err(MapError::from)?
                        .to_rgba8();

                    let size = [image.width() as _, image.height() as _];
                    let pixels = image.into_raw();
                    Ok(egui::ColorImage::from_rgba_unmultiplied(size, &pixels))
                })()
                .with_context(|| format!("Failed to download tile from {}", &url));

                result.map_err(Arc::new)
            });
        Tile::Loading(promise)
    });

    // If the tile is loading, check if the promise is ready and update the state,
    // so that we can immediately draw the tile if it has just finished loading.
    if let Tile::Loading(promise) = tile_state {
        if let Some(result) = promise.ready() {
            match result {
                Ok(color_image) => {
                    let texture = ctx.load_texture(
                        format!("tile_{}_{}_{}", tile_id.z, tile_id.x, tile_id.y),
                        color_image.clone(),
                        Default::default(),
                    );
                    *tile_state = Tile::Loaded(texture);
                }
                Err(e) => {
                    error!("{:?}", e);
                    *tile_state = Tile::Failed(e.clone());
                }
            }
        }
    }
}

/// Draws a single map tile, or a placeholder while it is loading or after it failed.
pub(crate) fn draw_tile(
    tiles: &HashMap<TileId, Tile>,
    painter: &egui::Painter,
    tile_id: &TileId,
    tile_pos: egui::Pos2,
    tint: Color32,
) {
    let tile_rect = Rect::from_min_size(tile_pos, Vec2::new(TILE_SIZE as f32, TILE_SIZE as f32));

    let (symbol, color) = match tiles.get(tile_id) {
        Some(Tile::Loaded(texture)) => {
            painter.image(
                texture.id(),
                tile_rect,
                Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                tint,
            );
            return;
        }
        Some(Tile::Failed(_)) => ("!", Color32::RED),
        Some(Tile::Loading(_)) | None => ("?", Color32::ORANGE),
    };

    // Draw a gray background and a border for the placeholder.
    painter.rect_filled(tile_rect, 0.0, Color32::from_gray(220));
    painter.rect_stroke(
        tile_rect,
        0.0,
        egui::Stroke::new(1.0, Color32::GRAY),
        egui::StrokeKind::Inside,
    );
    painter.text(
        tile_rect.center(),
        egui::Align2::CENTER_CENTER,
        symbol,
        egui::FontId::proportional(40.0),
        color,
    );
}

/// Converts longitude to the x-coordinate of a tile at a given zoom level.
pub(crate) fn lon_to_x(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * (2.0_f64.powi(zoom as i32))
}

/// Converts latitude to the y-coordinate of a tile at a given zoom level.
pub(crate) fn lat_to_y(lat: f64, zoom: u8) -> f64 {
    (1.0 - lat.to_radians().tan().asinh() / std::f64::consts::PI) / 2.0
        * (2.0_f64.powi(zoom as i32))
}

/// Converts the x-coordinate of a tile to longitude at a given zoom level.
pub(crate) fn x_to_lon(x: f64, zoom: u8) -> f64 {
    x / (2.0_f64.powi(zoom as i32)) * 360.0 - 180.0
}

/// Converts the y-coordinate of a tile to latitude at a given zoom level.
pub(crate) fn y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / (2.0_f64.powi(zoom as i32));
    n.sinh().atan().to_degrees()
}

impl Widget for &mut Map {
    fn ui(self, ui: &mut Ui) -> Response {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), Sense::drag().union(Sense::click()));
        self.handle_input(ui, &rect, &response);
        self.draw(ui, &rect);

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DynMapConfig, OpenStreetMapConfig};
    use crate::layers::marker::MarkerLayer;
    use egui::vec2;

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_coord_conversion_roundtrip() {
        let zoom: u8 = 13;
        for (lon, lat) in [(17.0385, 51.1079), (-122.4194, 37.7749)] {
            let final_lon = x_to_lon(lon_to_x(lon, zoom), zoom);
            let final_lat = y_to_lat(lat_to_y(lat, zoom), zoom);
            assert!((lon - final_lon).abs() < EPSILON);
            assert!((lat - final_lat).abs() < EPSILON);
        }
    }

    #[test]
    fn test_y_to_lat_conversion() {
        // y, zoom, expected_lat
        let test_cases = vec![
            // Equator
            (0.5, 0, 0.0),
            (128.0, 8, 0.0),
            // Near poles (Mercator projection limits)
            (0.0, 0, 85.0511287798),
            (1.0, 0, -85.0511287798),
            (256.0, 8, -85.0511287798),
        ];

        for (y, zoom, expected_lat) in test_cases {
            assert!((y_to_lat(y, zoom) - expected_lat).abs() < EPSILON);
        }
    }

    #[test]
    fn test_lon_to_x_conversion() {
        // lon, zoom, expected_x
        let test_cases = vec![
            (0.0, 0, 0.5),
            (0.0, 8, 128.0),
            (-180.0, 0, 0.0),
            (180.0, 8, 256.0),
            (-0.1275, 8, 127.90933333333333),
        ];

        for (lon, zoom, expected_x) in test_cases {
            assert!((lon_to_x(lon, zoom) - expected_x).abs() < EPSILON);
        }
    }

    #[test]
    fn test_tile_id_to_url() {
        let config = OpenStreetMapConfig::default();
        let tile_id = TileId {
            z: 10,
            x: 559,
            y: 330,
        };
        let url = tile_id.to_url(&config);
        assert_eq!(url, "https://tile.openstreetmap.org/10/559/330.png");
    }

    #[test]
    fn test_map_new() {
        let config = OpenStreetMapConfig::default();
        let default_center = config.default_center();
        let default_zoom = config.default_zoom();

        let map = Map::new(config);

        assert_eq!(map.center, default_center);
        assert_eq!(map.zoom, default_zoom);
        assert!(map.mouse_pos.is_none());
        assert!(map.tiles.is_empty());
        assert!(map.layers.is_empty());
    }

    #[test]
    fn test_recenter_clamps_zoom() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        let target = GeoPos::from_lat_lon(10.0, 20.0);
        map.recenter(target, 42);
        assert_eq!(map.center, target);
        assert_eq!(map.zoom, MAX_ZOOM);
    }

    #[test]
    fn test_take_interaction_is_one_shot() {
        let mut map = Map::new(OpenStreetMapConfig::default());
        map.interaction = Some(GeoPos::from_lat_lon(51.11, 17.04));
        assert_eq!(map.take_interaction(), Some(GeoPos::from_lat_lon(51.11, 17.04)));
        assert_eq!(map.take_interaction(), None);
    }

    #[test]
    fn test_layers_by_key() {
        let mut map = Map::new(DynMapConfig::new(|_| String::new()));
        map.add_layer("favorites", MarkerLayer::default());
        map.add_layer("location", MarkerLayer::default());

        map.layer_mut::<MarkerLayer>("favorites")
            .unwrap()
            .place(GeoPos::from_lat_lon(1.0, 2.0), "A");
        assert_eq!(map.layer::<MarkerLayer>("favorites").unwrap().len(), 1);
        assert_eq!(map.layer::<MarkerLayer>("location").unwrap().len(), 0);

        // Replacing keeps a single entry per key.
        map.add_layer("favorites", MarkerLayer::default());
        assert_eq!(map.layers.len(), 2);
        assert!(map.layer::<MarkerLayer>("favorites").unwrap().is_empty());

        assert!(map.remove_layer("location"));
        assert!(!map.remove_layer("location"));
        map.clear_layers();
        assert!(map.layer::<MarkerLayer>("favorites").is_none());
    }

    #[test]
    fn test_visible_tiles_stay_inside_world() {
        let projection = MapProjection::new(
            0,
            GeoPos::default(),
            Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0)),
        );
        let tiles: Vec<_> = visible_tiles(&projection).map(|(id, _)| id).collect();
        assert_eq!(tiles, vec![TileId { z: 0, x: 0, y: 0 }]);
    }

    fn run_frame(ctx: &egui::Context, map: &mut Map, events: Vec<egui::Event>) {
        let input = egui::RawInput {
            screen_rect: Some(Rect::from_min_size(egui::pos2(0.0, 0.0), vec2(800.0, 600.0))),
            events,
            ..Default::default()
        };
        let _ = ctx.run(input, |ctx| {
            egui::CentralPanel::default()
                .frame(egui::Frame::NONE)
                .show(ctx, |ui| {
                    ui.add(&mut *map);
                });
        });
    }

    fn primary(pos: egui::Pos2, pressed: bool) -> egui::Event {
        egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed,
            modifiers: egui::Modifiers::NONE,
        }
    }

    /// Hovers `pos` for one frame so the map is hit-tested under the pointer.
    fn hover(ctx: &egui::Context, map: &mut Map, pos: egui::Pos2) {
        run_frame(ctx, map, vec![egui::Event::PointerMoved(pos)]);
    }

    fn click(ctx: &egui::Context, map: &mut Map, pos: egui::Pos2) {
        run_frame(ctx, map, vec![egui::Event::PointerMoved(pos), primary(pos, true)]);
        run_frame(ctx, map, vec![egui::Event::PointerMoved(pos), primary(pos, false)]);
    }

    fn input_map(interaction: Interaction) -> Map {
        Map::new(
            DynMapConfig::new(|_| String::new())
                .with_view(GeoPos::from_lat_lon(51.1079, 17.0385), 13)
                .with_interaction(interaction),
        )
    }

    #[test]
    fn single_click_picks_in_click_mode() {
        let ctx = egui::Context::default();
        let mut map = input_map(Interaction::Click);
        let center = egui::pos2(400.0, 300.0);

        hover(&ctx, &mut map, center);
        assert!(map.take_interaction().is_none());

        click(&ctx, &mut map, center);
        let picked = map.take_interaction().expect("a click picks a coordinate");
        assert!((picked.lat - 51.1079).abs() < 1e-4);
        assert!((picked.lon - 17.0385).abs() < 1e-4);
        assert_eq!(map.zoom, 13);
    }

    #[test]
    fn double_click_mode_ignores_single_clicks() {
        let ctx = egui::Context::default();
        let mut map = input_map(Interaction::DoubleClick);
        let center = egui::pos2(400.0, 300.0);

        hover(&ctx, &mut map, center);
        click(&ctx, &mut map, center);
        assert!(map.take_interaction().is_none());

        // The second click lands within the double-click window.
        click(&ctx, &mut map, center);
        let picked = map.take_interaction().expect("a double-click picks a coordinate");
        assert!((picked.lat - 51.1079).abs() < 1e-4);
        assert!((picked.lon - 17.0385).abs() < 1e-4);

        // Picking replaces the zoom gesture.
        assert_eq!(map.zoom, 13);
        assert!((map.center.lat - 51.1079).abs() < 1e-6);
    }

    #[test]
    fn double_click_zooms_in_click_mode() {
        let ctx = egui::Context::default();
        let mut map = input_map(Interaction::Click);
        let pos = egui::pos2(500.0, 300.0);

        hover(&ctx, &mut map, pos);
        click(&ctx, &mut map, pos);
        click(&ctx, &mut map, pos);
        assert_eq!(map.zoom, 14);
    }

    #[test]
    fn clicking_a_pin_opens_its_popup_instead_of_picking() {
        let ctx = egui::Context::default();
        let mut map = input_map(Interaction::Click);
        let mut markers = MarkerLayer::default();
        let id = markers.place(GeoPos::from_lat_lon(51.1079, 17.0385), "Rynek");
        map.add_layer("markers", markers);

        // The pin's head sits above its tip at the map center.
        let head = egui::pos2(400.0, 280.0);
        hover(&ctx, &mut map, head);
        click(&ctx, &mut map, head);

        assert!(map.take_interaction().is_none());
        let markers = map.layer::<MarkerLayer>("markers").unwrap();
        assert_eq!(markers.opened(), Some(id));
    }

    #[test]
    fn double_clicking_a_pin_keeps_its_popup_open() {
        let ctx = egui::Context::default();
        let mut map = input_map(Interaction::DoubleClick);
        let mut markers = MarkerLayer::default();
        let id = markers.place(GeoPos::from_lat_lon(51.1079, 17.0385), "Rynek");
        map.add_layer("markers", markers);

        let head = egui::pos2(400.0, 280.0);
        hover(&ctx, &mut map, head);
        click(&ctx, &mut map, head);
        click(&ctx, &mut map, head);

        assert!(map.take_interaction().is_none());
        assert_eq!(map.zoom, 13);
        let markers = map.layer::<MarkerLayer>("markers").unwrap();
        assert_eq!(markers.opened(), Some(id));
    }
}
