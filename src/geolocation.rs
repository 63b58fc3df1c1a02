//! One-shot lookup of the user's current position.
//!
//! The lookup runs once on a background thread; the UI polls the request every frame and gets
//! the result exactly once. Requests are never retried or cancelled.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use poll_promise::Promise;
use serde::Deserialize;
use thiserror::Error;

use crate::CLIENT;
use crate::config::FavoritesConfig;
use crate::projection::GeoPos;

/// Errors that can occur while locating the user.
#[derive(Error, Debug)]
pub enum GeolocationError {
    /// An error occurred while making a web request.
    #[error("Connection error")]
    Connection(#[from] reqwest::Error),

    /// The service answered with an HTTP error.
    #[error("Location service responded with HTTP status `{0}`")]
    HttpStatus(String),

    /// The service could not locate us.
    #[error("Location service failed: {0}")]
    Service(String),

    /// The response could not be read.
    #[error("Unable to read the location service response")]
    Decode(#[from] serde_json::Error),

    /// Locating is turned off.
    #[error("Geolocation is not supported")]
    Unsupported,
}

/// Something that can tell where the user is.
pub trait Geolocator: Send + Sync {
    /// Looks up the current position. Blocks until the answer arrives or the lookup fails.
    fn locate(&self) -> Result<GeoPos, GeolocationError>;
}

/// Locates the user from their IP address with the ip-api.com service.
#[derive(Clone, Debug)]
pub struct IpApiGeolocator {
    url: String,
    timeout: Duration,
}

impl Default for IpApiGeolocator {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

impl IpApiGeolocator {
    /// Creates a locator whose request gives up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            url: "http://ip-api.com/json/?fields=status,message,lat,lon".to_string(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

fn parse_ip_api(body: &str) -> Result<GeoPos, GeolocationError> {
    let response: IpApiResponse = serde_json::from_str(body)?;
    if response.status != "success" {
        return Err(GeolocationError::Service(
            response.message.unwrap_or(response.status),
        ));
    }
    match (response.lat, response.lon) {
        (Some(lat), Some(lon)) => Ok(GeoPos::from_lat_lon(lat, lon)),
        _ => Err(GeolocationError::Service(
            "response has no coordinates".to_string(),
        )),
    }
}

impl Geolocator for IpApiGeolocator {
    fn locate(&self) -> Result<GeoPos, GeolocationError> {
        debug!("Requesting location from {}", &self.url);
        let response = CLIENT.get(&self.url).timeout(self.timeout).send()?;
        if !response.status().is_success() {
            return Err(GeolocationError::HttpStatus(response.status().to_string()));
        }
        let pos = parse_ip_api(&response.text()?)?;
        info!("Located at {:.4}, {:.4}", pos.lat, pos.lon);
        Ok(pos)
    }
}

type Outcome = Result<GeoPos, GeolocationError>;

/// A position lookup in flight.
pub struct GeolocationRequest {
    promise: Option<Promise<Outcome>>,
}

impl GeolocationRequest {
    /// Starts looking up the position on a background thread.
    pub fn spawn(locator: Arc<dyn Geolocator>) -> Self {
        let promise = Promise::spawn_thread("geolocation", move || locator.locate());
        Self {
            promise: Some(promise),
        }
    }

    /// Starts the lookup configured by `config`: an ip-api.com request, or an immediate
    /// [`GeolocationError::Unsupported`] when geolocation is turned off.
    pub fn from_config(config: &FavoritesConfig) -> Self {
        if config.geolocation_enabled {
            Self::spawn(Arc::new(IpApiGeolocator::new(config.geolocation_timeout)))
        } else {
            Self::ready(Err(GeolocationError::Unsupported))
        }
    }

    /// A request that has already settled with `outcome`.
    pub fn ready(outcome: Outcome) -> Self {
        Self {
            promise: Some(Promise::from_ready(outcome)),
        }
    }

    /// Returns the outcome the first time it is polled after the lookup finished.
    pub fn poll(&mut self) -> Option<Outcome> {
        let promise = self.promise.take()?;
        match promise.try_take() {
            Ok(outcome) => Some(outcome),
            Err(promise) => {
                self.promise = Some(promise);
                None
            }
        }
    }

    /// Whether the outcome has been handed out.
    pub fn is_settled(&self) -> bool {
        self.promise.is_none()
    }
}
