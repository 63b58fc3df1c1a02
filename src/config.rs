//! Configuration for the map provider and the favorites view.

use std::time::Duration;

use egui::{Color32, Vec2, vec2};
use serde::{Deserialize, Serialize};

use crate::TileId;
use crate::projection::GeoPos;

/// The pointer gesture that selects a coordinate on the map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    /// A single primary click.
    #[default]
    Click,

    /// A primary double-click.
    DoubleClick,
}

/// How map pins are drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerStyle {
    /// Size of the pin in screen points.
    pub size: Vec2,

    /// The point of the pin, relative to its top-left corner, that sits on the coordinate.
    pub anchor: Vec2,

    /// Fill color of the pin head.
    pub fill: Color32,

    /// Outline color of the pin.
    pub stroke: Color32,

    /// Background of the label popup.
    pub popup_background: Color32,

    /// Text color of the label popup.
    pub popup_text: Color32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            size: vec2(24.0, 36.0),
            anchor: vec2(12.0, 36.0),
            fill: Color32::from_rgb(42, 129, 203),
            stroke: Color32::from_rgb(19, 67, 107),
            popup_background: Color32::from_rgba_unmultiplied(255, 255, 255, 230),
            popup_text: Color32::BLACK,
        }
    }
}

impl MarkerStyle {
    /// A red variant, used for the "you are here" pin.
    pub fn location() -> Self {
        Self {
            fill: Color32::from_rgb(203, 43, 62),
            stroke: Color32::from_rgb(130, 25, 38),
            ..Self::default()
        }
    }
}

/// Configuration for a map provider.
pub trait MapConfig {
    /// Returns the URL for a given tile.
    fn tile_url(&self, tile: &TileId) -> String;

    /// Returns the attribution text to be displayed on the map. If returns `None`, no attribution is shown.
    fn attribution(&self) -> Option<&String>;

    /// Returns the attribution URL to be linked from the attribution text.
    fn attribution_url(&self) -> Option<&String>;

    /// The default geographical center of the map.
    fn default_center(&self) -> GeoPos;

    /// The default zoom level of the map.
    fn default_zoom(&self) -> u8;

    /// The gesture that reports a coordinate through [`crate::Map::take_interaction`].
    fn interaction(&self) -> Interaction {
        Interaction::Click
    }

    /// The style used for pins placed on this map.
    fn marker_style(&self) -> MarkerStyle {
        MarkerStyle::default()
    }
}

/// Configuration for the OpenStreetMap tile server.
///
/// # Example
///
/// ```
/// use geogems::config::OpenStreetMapConfig;
/// let config = OpenStreetMapConfig::default();
/// ```
#[cfg(feature = "openstreetmap")]
pub struct OpenStreetMapConfig {
    base_url: String,
    attribution: String,
    attribution_url: String,
    default_center: GeoPos,
    default_zoom: u8,
    interaction: Interaction,
    marker_style: MarkerStyle,
}

#[cfg(feature = "openstreetmap")]
impl Default for OpenStreetMapConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tile.openstreetmap.org".to_string(),
            attribution: "© OpenStreetMap contributors".to_string(),
            attribution_url: "https://www.openstreetmap.org".to_string(),
            default_center: GeoPos::from_lat_lon(51.1079, 17.0385), // Wrocław, Poland
            default_zoom: 13,
            interaction: Interaction::Click,
            marker_style: MarkerStyle::default(),
        }
    }
}

#[cfg(feature = "openstreetmap")]
impl OpenStreetMapConfig {
    /// Selects coordinates with a double-click instead of a single click.
    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = interaction;
        self
    }

    /// Uses a custom pin style.
    pub fn with_marker_style(mut self, marker_style: MarkerStyle) -> Self {
        self.marker_style = marker_style;
        self
    }
}

#[cfg(feature = "openstreetmap")]
impl MapConfig for OpenStreetMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        format!("{}/{}/{}/{}.png", self.base_url, tile.z, tile.x, tile.y)
    }

    fn attribution(&self) -> Option<&String> {
        Some(&self.attribution)
    }

    fn attribution_url(&self) -> Option<&String> {
        Some(&self.attribution_url)
    }

    fn default_center(&self) -> GeoPos {
        self.default_center
    }

    fn default_zoom(&self) -> u8 {
        self.default_zoom
    }

    fn interaction(&self) -> Interaction {
        self.interaction
    }

    fn marker_style(&self) -> MarkerStyle {
        self.marker_style.clone()
    }
}

/// A dynamic map configuration that allows defining a custom tile URL function at runtime.
///
/// # Example
///
/// ```
/// use geogems::config::DynMapConfig;
/// let config = DynMapConfig::new(|tile| format!("https://my-tile-server/{}/{}/{}.png", tile.z, tile.x, tile.y));
/// ```
pub struct DynMapConfig {
    tile_url: Box<dyn Fn(&TileId) -> String>,
    default_center: GeoPos,
    default_zoom: u8,
    interaction: Interaction,
}

impl DynMapConfig {
    /// Creates a new `DynMapConfig` with a custom tile URL function.
    pub fn new(tile_url: impl Fn(&TileId) -> String + 'static) -> Self {
        Self {
            tile_url: Box::new(tile_url),
            default_center: GeoPos::from_lat_lon(51.1079, 17.0385),
            default_zoom: 13,
            interaction: Interaction::Click,
        }
    }

    /// Selects the gesture that picks a coordinate.
    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = interaction;
        self
    }

    /// Sets the initial view.
    pub fn with_view(mut self, center: GeoPos, zoom: u8) -> Self {
        self.default_center = center;
        self.default_zoom = zoom;
        self
    }
}

impl MapConfig for DynMapConfig {
    fn tile_url(&self, tile: &TileId) -> String {
        (self.tile_url)(tile)
    }

    fn attribution(&self) -> Option<&String> {
        None
    }

    fn attribution_url(&self) -> Option<&String> {
        None
    }

    fn default_center(&self) -> GeoPos {
        self.default_center
    }

    fn default_zoom(&self) -> u8 {
        self.default_zoom
    }

    fn interaction(&self) -> Interaction {
        self.interaction
    }
}

/// Settings for the favorites view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FavoritesConfig {
    /// The storage key holding the favorites list.
    pub storage_key: String,

    /// Prefix of the generated name for unlabeled favorites, e.g. "Marker 3".
    pub default_label_prefix: String,

    /// Zoom used when a favorite is picked from the list.
    pub select_zoom: u8,

    /// Zoom used when recentering on the located position.
    pub locate_zoom: u8,

    /// List favorites newest-first.
    pub newest_first: bool,

    /// Drop a pin at the located position.
    pub mark_location: bool,

    /// Look up the current position on startup.
    pub geolocation_enabled: bool,

    /// How long a toast stays on screen.
    #[serde(with = "duration_millis")]
    pub toast_duration: Duration,

    /// Request timeout of the position lookup.
    #[serde(with = "duration_millis")]
    pub geolocation_timeout: Duration,
}

impl Default for FavoritesConfig {
    fn default() -> Self {
        Self {
            storage_key: "favorites".to_string(),
            default_label_prefix: "Marker".to_string(),
            select_zoom: 15,
            locate_zoom: 13,
            newest_first: true,
            mark_location: true,
            geolocation_enabled: true,
            toast_duration: Duration::from_secs(3),
            geolocation_timeout: Duration::from_millis(5000),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
