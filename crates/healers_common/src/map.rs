//! Map view - position state and static map rendering
//!
//! The view starts at the configured default centre and only moves when the
//! user asks to use their location. Without a maps API key no view can be
//! built at all.

use reqwest::Url;
use tracing::{debug, warn};

use crate::capability::{CapabilityAcquirer, CapabilityError, Coordinates};
use crate::config::{ConfigError, MapsConfig};

const STATIC_MAP_URL: &str = "https://maps.googleapis.com/maps/api/staticmap";
const MAP_SIZE: &str = "640x400";

/// Named point drawn on the map
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    pub position: Coordinates,
}

impl Marker {
    pub fn new(name: impl Into<String>, position: Coordinates) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapView {
    api_key: String,
    center: Coordinates,
    zoom: u8,
    markers: Vec<Marker>,
}

impl MapView {
    pub fn new(config: &MapsConfig) -> Result<Self, ConfigError> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self {
            api_key,
            center: config.default_center,
            zoom: config.zoom,
            markers: Vec::new(),
        })
    }

    pub fn with_markers(mut self, markers: Vec<Marker>) -> Self {
        self.markers = markers;
        self
    }

    pub fn center(&self) -> Coordinates {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Re-centre on the device position. On failure the centre is unchanged.
    pub async fn use_my_location(
        &mut self,
        capabilities: &dyn CapabilityAcquirer,
    ) -> Result<Coordinates, CapabilityError> {
        match capabilities.acquire_location().await {
            Ok(coords) => {
                debug!("Map re-centred on {}", coords);
                self.center = coords;
                Ok(coords)
            }
            Err(e) => {
                warn!("Map location unavailable: {}", e);
                Err(e)
            }
        }
    }

    /// Static map image URL: location markers in red, the centre in blue
    pub fn static_url(&self) -> Result<Url, ConfigError> {
        let mut params = vec![
            ("center".to_string(), coord_param(self.center)),
            ("zoom".to_string(), self.zoom.to_string()),
            ("size".to_string(), MAP_SIZE.to_string()),
        ];
        for marker in &self.markers {
            params.push((
                "markers".to_string(),
                format!("color:red|{}", coord_param(marker.position)),
            ));
        }
        params.push((
            "markers".to_string(),
            format!("color:blue|{}", coord_param(self.center)),
        ));
        params.push(("key".to_string(), self.api_key.clone()));

        Url::parse_with_params(STATIC_MAP_URL, &params).map_err(|e| ConfigError::Invalid {
            key: "maps",
            reason: e.to_string(),
        })
    }
}

fn coord_param(c: Coordinates) -> String {
    format!("{},{}", c.latitude, c.longitude)
}
