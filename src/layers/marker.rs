//! A layer of labeled pins.
//!
//! # Example
//!
//! ```no_run
//! use eframe::egui;
//! use geogems::{Map, config::{MapConfig, OpenStreetMapConfig}, layers::marker::MarkerLayer, projection::GeoPos};
//!
//! struct MyApp {
//!     map: Map,
//! }
//!
//! impl Default for MyApp {
//!     fn default() -> Self {
//!         let config = OpenStreetMapConfig::default();
//!         let mut markers = MarkerLayer::new(config.marker_style());
//!         markers.place(GeoPos::from_lat_lon(51.1099, 17.0322), "Rynek");
//!
//!         let mut map = Map::new(config);
//!         map.add_layer("markers", markers);
//!         Self { map }
//!     }
//! }
//!
//! impl eframe::App for MyApp {
//!     fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
//!         egui::CentralPanel::default().show(ctx, |ui| {
//!             ui.add(&mut self.map);
//!         });
//!     }
//! }
//! ```

use egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Response, Shape, Stroke, vec2};
use std::any::Any;

use crate::config::MarkerStyle;
use crate::layers::Layer;
use crate::projection::{GeoPos, MapProjection};

/// A handle to a pin placed on a [`MarkerLayer`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct MarkerId(u64);

/// A pin with a label.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    /// The handle of the pin.
    pub id: MarkerId,

    /// Where the pin points.
    pub pos: GeoPos,

    /// Text shown in the pin's popup.
    pub label: String,
}

/// Layer implementation that draws pins and shows their label on hover or click.
pub struct MarkerLayer {
    markers: Vec<Marker>,
    style: MarkerStyle,
    next_id: u64,
    hovered: Option<MarkerId>,
    open_popup: Option<MarkerId>,
}

impl Default for MarkerLayer {
    fn default() -> Self {
        Self::new(MarkerStyle::default())
    }
}

impl MarkerLayer {
    /// Creates an empty layer that draws pins with `style`.
    pub fn new(style: MarkerStyle) -> Self {
        Self {
            markers: Vec::new(),
            style,
            next_id: 0,
            hovered: None,
            open_popup: None,
        }
    }

    /// Places a pin at `pos` and returns its handle.
    pub fn place(&mut self, pos: GeoPos, label: impl Into<String>) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.markers.push(Marker {
            id,
            pos,
            label: label.into(),
        });
        id
    }

    /// Removes a pin. Returns the removed pin, if it existed.
    pub fn remove(&mut self, id: MarkerId) -> Option<Marker> {
        let index = self.markers.iter().position(|m| m.id == id)?;
        if self.open_popup == Some(id) {
            self.open_popup = None;
        }
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        Some(self.markers.remove(index))
    }

    /// Removes every pin.
    pub fn clear(&mut self) {
        self.markers.clear();
        self.hovered = None;
        self.open_popup = None;
    }

    /// Gets a pin by handle.
    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    /// Shows the popup of a pin until another one is opened or it is clicked again.
    pub fn open_popup(&mut self, id: MarkerId) {
        if self.get(id).is_some() {
            self.open_popup = Some(id);
        }
    }

    /// The pin whose popup is open, if any.
    pub fn opened(&self) -> Option<MarkerId> {
        self.open_popup
    }

    /// Iterates over the pins in placement order.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    /// The number of pins.
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether the layer has no pins.
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// The screen rectangle covered by the pin drawn at `screen_pos`.
    fn pin_rect(&self, screen_pos: Pos2) -> Rect {
        Rect::from_min_size(screen_pos - self.style.anchor, self.style.size)
    }

    /// Finds the topmost pin under `screen_pos`.
    fn find_marker_at(&self, screen_pos: Pos2, projection: &MapProjection) -> Option<MarkerId> {
        self.markers
            .iter()
            .rev()
            .find(|m| self.pin_rect(projection.project(m.pos)).contains(screen_pos))
            .map(|m| m.id)
    }

    fn draw_pin(&self, painter: &Painter, screen_pos: Pos2) {
        let rect = self.pin_rect(screen_pos);
        let radius = rect.width() / 2.0;
        let head = rect.center_top() + vec2(0.0, radius);
        let stroke = Stroke::new(1.0, self.style.stroke);

        // The tip of the pin is the anchor point.
        let tip = rect.min + self.style.anchor;
        painter.add(Shape::convex_polygon(
            vec![
                head + vec2(-radius * 0.87, radius * 0.5),
                tip,
                head + vec2(radius * 0.87, radius * 0.5),
            ],
            self.style.fill,
            stroke,
        ));
        painter.circle(head, radius, self.style.fill, stroke);
        painter.circle_filled(head, radius * 0.4, Color32::WHITE);
    }

    fn draw_popup(&self, painter: &Painter, screen_pos: Pos2, label: &str) {
        let galley = painter.layout_no_wrap(
            label.to_string(),
            FontId::proportional(13.0),
            self.style.popup_text,
        );
        let top = self.pin_rect(screen_pos).min.y - 6.0;
        let rect = Align2::CENTER_BOTTOM
            .anchor_rect(Rect::from_min_size(Pos2::new(screen_pos.x, top), galley.size()));

        painter.rect_filled(rect.expand(4.0), 3.0, self.style.popup_background);
        painter.galley(rect.min, galley, Color32::TRANSPARENT);
    }
}

impl Layer for MarkerLayer {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn handle_input(&mut self, response: &Response, projection: &MapProjection) -> bool {
        self.hovered = response
            .hover_pos()
            .and_then(|pos| self.find_marker_at(pos, projection));

        if self.hovered.is_some() {
            response.ctx.set_cursor_icon(egui::CursorIcon::PointingHand);
        }

        if response.clicked() {
            if let Some(pointer_pos) = response.interact_pointer_pos() {
                if let Some(id) = self.find_marker_at(pointer_pos, projection) {
                    // Clicking a pin toggles its popup instead of picking a coordinate. The
                    // second click of a double-click is swallowed so the popup stays as it was.
                    if response.double_clicked() {
                        return true;
                    }
                    self.open_popup = if self.open_popup == Some(id) {
                        None
                    } else {
                        Some(id)
                    };
                    return true;
                }
            }
        }

        false
    }

    fn draw(&self, painter: &Painter, projection: &MapProjection) {
        for marker in &self.markers {
            self.draw_pin(painter, projection.project(marker.pos));
        }

        // Popups go on top of every pin.
        for marker in &self.markers {
            if self.hovered == Some(marker.id) || self.open_popup == Some(marker.id) {
                self.draw_popup(painter, projection.project(marker.pos), &marker.label);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    fn projection() -> MapProjection {
        MapProjection::new(
            13,
            GeoPos::from_lat_lon(51.1079, 17.0385),
            Rect::from_min_size(pos2(0.0, 0.0), vec2(800.0, 600.0)),
        )
    }

    #[test]
    fn marker_layer_place_assigns_unique_ids() {
        let mut layer = MarkerLayer::default();
        let a = layer.place(GeoPos::from_lat_lon(10.0, 20.0), "A");
        let b = layer.place(GeoPos::from_lat_lon(10.0, 20.0), "B");
        assert_ne!(a, b);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.get(a).unwrap().label, "A");
        assert_eq!(layer.get(b).unwrap().label, "B");
    }

    #[test]
    fn marker_layer_remove_and_clear() {
        let mut layer = MarkerLayer::default();
        let a = layer.place(GeoPos::from_lat_lon(10.0, 20.0), "A");
        let b = layer.place(GeoPos::from_lat_lon(11.0, 21.0), "B");
        layer.open_popup(a);

        assert_eq!(layer.remove(a).map(|m| m.label), Some("A".to_string()));
        assert!(layer.remove(a).is_none());
        assert!(layer.opened().is_none());
        assert_eq!(layer.len(), 1);

        // Ids are never reused after a removal.
        let c = layer.place(GeoPos::from_lat_lon(12.0, 22.0), "C");
        assert_ne!(c, a);
        assert_ne!(c, b);

        layer.clear();
        assert!(layer.is_empty());
    }

    #[test]
    fn marker_layer_open_popup_ignores_unknown_ids() {
        let mut layer = MarkerLayer::default();
        let a = layer.place(GeoPos::default(), "A");
        layer.clear();
        layer.open_popup(a);
        assert!(layer.opened().is_none());
    }

    #[test]
    fn marker_hit_test_uses_anchor() {
        let projection = projection();
        let mut layer = MarkerLayer::default();
        let id = layer.place(projection.center(), "Center");

        // The tip sits on the coordinate, the head is above it.
        let tip = projection.project(projection.center());
        assert_eq!(layer.find_marker_at(tip + vec2(0.0, -20.0), &projection), Some(id));
        assert_eq!(layer.find_marker_at(tip + vec2(0.0, 10.0), &projection), None);
        assert_eq!(layer.find_marker_at(tip + vec2(30.0, -20.0), &projection), None);
    }

    #[test]
    fn marker_hit_test_prefers_topmost() {
        let projection = projection();
        let mut layer = MarkerLayer::default();
        layer.place(projection.center(), "Below");
        let top = layer.place(projection.center(), "Above");
        let tip = projection.project(projection.center());
        assert_eq!(layer.find_marker_at(tip + vec2(0.0, -20.0), &projection), Some(top));
    }

    #[test]
    fn marker_layer_as_any() {
        let layer = MarkerLayer::default();
        assert!(layer.as_any().is::<MarkerLayer>());
    }
}
