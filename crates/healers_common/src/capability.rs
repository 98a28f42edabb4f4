//! Capability acquisition - device geolocation and camera
//!
//! Both requests are one-shot and single-attempt. Platform outcomes are
//! normalized into `CapabilityError` with a message fit for an inline alert.
//!
//! A `CameraStream` owns its tracks. Dropping the stream stops every track,
//! so a session that is torn down on any path releases the camera.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;

pub const MSG_LOCATION_UNSUPPORTED: &str = "Geolocation is not supported by this device.";
pub const MSG_LOCATION_DENIED: &str =
    "Could not get your location. Please enable location services.";
pub const MSG_CAMERA_UNSUPPORTED: &str = "Camera is not supported by this device.";
pub const MSG_CAMERA_DENIED: &str =
    "Camera access denied. Please enable camera permissions to check vitals.";

/// WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Capability request outcome, already phrased for the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("{0}")]
    Denied(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Unavailable(String),
}

impl CapabilityError {
    pub fn message(&self) -> &str {
        match self {
            CapabilityError::Denied(m)
            | CapabilityError::Unsupported(m)
            | CapabilityError::Unavailable(m) => m,
        }
    }
}

/// Observer for a track's liveness, usable after the stream is gone
#[derive(Debug, Clone)]
pub struct TrackProbe(Arc<AtomicBool>);

impl TrackProbe {
    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One video track of a camera stream
#[derive(Debug)]
pub struct MediaTrack {
    label: String,
    live: Arc<AtomicBool>,
    source: Option<std::fs::File>,
}

impl MediaTrack {
    pub fn new(label: impl Into<String>, source: Option<std::fs::File>) -> Self {
        Self {
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
            source,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn probe(&self) -> TrackProbe {
        TrackProbe(self.live.clone())
    }

    /// Stop the track and close its device handle. Idempotent.
    pub fn stop(&mut self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!("Stopping track {}", self.label);
        }
        self.source = None;
    }
}

/// Live camera stream bound to a display surface
#[derive(Debug)]
pub struct CameraStream {
    tracks: Vec<MediaTrack>,
}

impl CameraStream {
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn probes(&self) -> Vec<TrackProbe> {
        self.tracks.iter().map(MediaTrack::probe).collect()
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn stop_all(&mut self) {
        for track in &mut self.tracks {
            track.stop();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Device capability requests
#[async_trait]
pub trait CapabilityAcquirer: Send + Sync {
    async fn acquire_location(&self) -> Result<Coordinates, CapabilityError>;

    async fn acquire_camera(&self) -> Result<CameraStream, CapabilityError>;
}

/// Capabilities of the machine the shell runs on
///
/// Location comes from the configured fixed position; the camera is the
/// configured video device node.
pub struct DeviceCapabilities {
    location: Option<Coordinates>,
    camera_device: PathBuf,
}

impl DeviceCapabilities {
    pub fn new(location: Option<Coordinates>, camera_device: PathBuf) -> Self {
        Self {
            location,
            camera_device,
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::new(config.location, config.camera_device.clone())
    }
}

#[async_trait]
impl CapabilityAcquirer for DeviceCapabilities {
    async fn acquire_location(&self) -> Result<Coordinates, CapabilityError> {
        match self.location {
            Some(coords) => {
                info!("Location acquired: {}", coords);
                Ok(coords)
            }
            None => {
                warn!("No location source configured");
                Err(CapabilityError::Unsupported(
                    MSG_LOCATION_UNSUPPORTED.to_string(),
                ))
            }
        }
    }

    async fn acquire_camera(&self) -> Result<CameraStream, CapabilityError> {
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .open(&self.camera_device)
            .await
            .map_err(|e| camera_error(&self.camera_device, e))?;

        info!("Camera acquired: {}", self.camera_device.display());
        let label = self.camera_device.display().to_string();
        Ok(CameraStream::new(vec![MediaTrack::new(
            label,
            Some(file.into_std().await),
        )]))
    }
}

fn camera_error(device: &std::path::Path, err: io::Error) -> CapabilityError {
    warn!("Camera {} unavailable: {}", device.display(), err);
    match err.kind() {
        io::ErrorKind::NotFound => CapabilityError::Unsupported(MSG_CAMERA_UNSUPPORTED.to_string()),
        io::ErrorKind::PermissionDenied => {
            CapabilityError::Denied(MSG_CAMERA_DENIED.to_string())
        }
        _ => CapabilityError::Unavailable(format!("Camera unavailable: {}", err)),
    }
}

/// Scripted capabilities for tests
pub struct FakeCapabilities {
    location: Result<Coordinates, CapabilityError>,
    camera: Result<(), CapabilityError>,
    location_calls: AtomicUsize,
    camera_calls: AtomicUsize,
    issued: Mutex<Vec<TrackProbe>>,
}

impl FakeCapabilities {
    pub fn new(
        location: Result<Coordinates, CapabilityError>,
        camera: Result<(), CapabilityError>,
    ) -> Self {
        Self {
            location,
            camera,
            location_calls: AtomicUsize::new(0),
            camera_calls: AtomicUsize::new(0),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Both capabilities granted
    pub fn granted(coords: Coordinates) -> Self {
        Self::new(Ok(coords), Ok(()))
    }

    /// Both capabilities denied
    pub fn denied() -> Self {
        Self::new(
            Err(CapabilityError::Denied(MSG_LOCATION_DENIED.to_string())),
            Err(CapabilityError::Denied(MSG_CAMERA_DENIED.to_string())),
        )
    }

    pub fn location_calls(&self) -> usize {
        self.location_calls.load(Ordering::SeqCst)
    }

    pub fn camera_calls(&self) -> usize {
        self.camera_calls.load(Ordering::SeqCst)
    }

    /// Probes for every track handed out so far
    pub fn issued_tracks(&self) -> Vec<TrackProbe> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl CapabilityAcquirer for FakeCapabilities {
    async fn acquire_location(&self) -> Result<Coordinates, CapabilityError> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        self.location.clone()
    }

    async fn acquire_camera(&self) -> Result<CameraStream, CapabilityError> {
        self.camera_calls.fetch_add(1, Ordering::SeqCst);
        self.camera.clone()?;

        let stream = CameraStream::new(vec![MediaTrack::new("fake-camera", None)]);
        self.issued.lock().unwrap().extend(stream.probes());
        Ok(stream)
    }
}
