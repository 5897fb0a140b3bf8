//! Camera enumeration and exclusive stream ownership.
//!
//! A [`StreamHandle`] is the only way to read frames. It is acquired through
//! [`DeviceManager::acquire`] into a caller-owned `Option<StreamHandle>` slot,
//! which guarantees that acquiring a new stream first releases the one held
//! in that slot. Releasing is idempotent, and dropping a handle releases it
//! too, so every exit path pairs an acquisition with exactly one release.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use medcard_core::GrayImage;
use serde::{Deserialize, Serialize};

/// Camera failure surfaced to the session. All variants are recoverable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("no camera device found")]
    DeviceNotFound,
    #[error("camera not supported")]
    DeviceUnsupported,
    #[error("camera error: {0}")]
    Other(String),
}

impl DeviceError {
    /// Message shown to the person holding the scanner.
    pub fn user_message(&self) -> String {
        match self {
            DeviceError::PermissionDenied => {
                "Camera access was denied. Allow camera access and try again.".to_owned()
            }
            DeviceError::DeviceNotFound => {
                "No camera was found. Connect a camera and try again.".to_owned()
            }
            DeviceError::DeviceUnsupported => {
                "This camera cannot be used for scanning. Try another camera.".to_owned()
            }
            DeviceError::Other(msg) => format!("The camera could not be started ({msg}). Try again."),
        }
    }
}

/// Optional camera feature that is not available.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("torch is not supported on this camera")]
    TorchUnsupported,
    #[error("no active camera stream")]
    NoActiveStream,
}

/// Camera as reported by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
}

/// Camera enumerated for a session, with the derived rear-facing flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
    pub rear_facing: bool,
}

impl From<DeviceInfo> for DeviceDescriptor {
    fn from(info: DeviceInfo) -> Self {
        let rear_facing = is_rear_facing_label(&info.label);
        Self {
            id: info.id,
            label: info.label,
            rear_facing,
        }
    }
}

/// Label heuristic for rear/back/environment cameras.
pub fn is_rear_facing_label(label: &str) -> bool {
    let label = label.to_lowercase();
    ["back", "rear", "environment"]
        .iter()
        .any(|hint| label.contains(hint))
}

/// First rear-facing device, otherwise the first device.
pub fn select_default(devices: &[DeviceDescriptor]) -> Option<&DeviceDescriptor> {
    devices
        .iter()
        .find(|d| d.rear_facing)
        .or_else(|| devices.first())
}

/// Requested resolution envelope. Bounded to keep per-frame decode cheap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            max_width: 1920,
            max_height: 1080,
        }
    }
}

impl StreamConstraints {
    pub fn admits(&self, width: usize, height: usize) -> bool {
        width <= self.max_width as usize && height <= self.max_height as usize
    }
}

/// One live media track of an acquired stream.
pub trait VideoTrack {
    /// Native dimensions of the next frame.
    fn dimensions(&self) -> (usize, usize);

    /// Copy the current frame into `buffer`, already sized to `dimensions()`.
    fn capture(&mut self, buffer: &mut GrayImage) -> Result<(), DeviceError>;

    /// False once the hardware ended the track.
    fn is_live(&self) -> bool;

    fn supports_torch(&self) -> bool {
        false
    }

    fn set_torch(&mut self, _on: bool) -> Result<(), CapabilityError> {
        Err(CapabilityError::TorchUnsupported)
    }

    /// Stop the track and free the hardware. Called once per track.
    fn stop(&mut self);
}

/// Source of camera devices and streams.
pub trait CameraBackend {
    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, DeviceError>;

    fn open(
        &mut self,
        device_id: &str,
        constraints: &StreamConstraints,
    ) -> Result<Vec<Box<dyn VideoTrack>>, DeviceError>;
}

#[derive(Debug, Default)]
struct StreamLedger {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Counts of acquisitions and releases seen by one [`DeviceManager`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub acquired: usize,
    pub released: usize,
}

impl StreamStats {
    pub fn active(&self) -> usize {
        self.acquired.saturating_sub(self.released)
    }
}

/// Exclusively held camera stream.
pub struct StreamHandle {
    id: u64,
    device: DeviceDescriptor,
    tracks: Vec<Box<dyn VideoTrack>>,
    released: bool,
    ledger: Arc<StreamLedger>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.id)
            .field("device", &self.device.id)
            .field("tracks", &self.tracks.len())
            .field("released", &self.released)
            .finish()
    }
}

impl StreamHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// The video track frames are read from.
    pub fn video(&mut self) -> Option<&mut (dyn VideoTrack + 'static)> {
        if self.released {
            return None;
        }
        self.tracks.first_mut().map(|t| t.as_mut())
    }

    /// True while every track is live.
    pub fn is_live(&self) -> bool {
        !self.released && self.tracks.iter().all(|t| t.is_live())
    }

    pub fn supports_torch(&self) -> bool {
        !self.released && self.tracks.first().is_some_and(|t| t.supports_torch())
    }

    pub fn set_torch(&mut self, on: bool) -> Result<(), CapabilityError> {
        match self.video() {
            Some(track) if track.supports_torch() => track.set_torch(on),
            Some(_) => Err(CapabilityError::TorchUnsupported),
            None => Err(CapabilityError::NoActiveStream),
        }
    }

    /// Stop every track. Returns true if this call did the release.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        for track in &mut self.tracks {
            track.stop();
        }
        self.released = true;
        self.ledger.released.fetch_add(1, Ordering::SeqCst);
        log::debug!("released stream #{} ({})", self.id, self.device.id);
        true
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if self.release() {
            log::warn!("stream #{} released on drop", self.id);
        }
    }
}

/// Enumerates cameras and hands out exclusive streams.
pub struct DeviceManager<B> {
    backend: B,
    ledger: Arc<StreamLedger>,
    next_id: u64,
}

impl<B: CameraBackend> DeviceManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            ledger: Arc::new(StreamLedger::default()),
            next_id: 1,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Enumerate cameras. Re-run on every session start.
    pub fn list_devices(&mut self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        let devices: Vec<DeviceDescriptor> = self
            .backend
            .enumerate()?
            .into_iter()
            .map(DeviceDescriptor::from)
            .collect();
        log::debug!("enumerated {} camera(s)", devices.len());
        Ok(devices)
    }

    /// Acquire a stream into `slot`, releasing whatever `slot` held first.
    ///
    /// With `device == None` the default device is chosen. On error `slot` is
    /// left empty.
    pub fn acquire<'s>(
        &mut self,
        slot: &'s mut Option<StreamHandle>,
        device: Option<&DeviceDescriptor>,
        constraints: &StreamConstraints,
    ) -> Result<&'s mut StreamHandle, DeviceError> {
        self.release(slot);

        let device = match device {
            Some(d) => d.clone(),
            None => {
                let devices = self.list_devices()?;
                select_default(&devices)
                    .cloned()
                    .ok_or(DeviceError::DeviceNotFound)?
            }
        };

        let mut tracks = self.backend.open(&device.id, constraints)?;
        if tracks.is_empty() {
            return Err(DeviceError::DeviceUnsupported);
        }
        let (w, h) = tracks[0].dimensions();
        if w == 0 || h == 0 {
            for track in &mut tracks {
                track.stop();
            }
            return Err(DeviceError::DeviceUnsupported);
        }
        if !constraints.admits(w, h) {
            log::debug!("camera {} delivers {w}x{h}, above requested maximum", device.id);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.ledger.acquired.fetch_add(1, Ordering::SeqCst);
        log::info!("acquired stream #{id} on {} ({w}x{h})", device.label);

        Ok(slot.insert(StreamHandle {
            id,
            device,
            tracks,
            released: false,
            ledger: Arc::clone(&self.ledger),
        }))
    }

    /// Release the stream in `slot`. A no-op for an empty slot or an already
    /// released handle.
    pub fn release(&self, slot: &mut Option<StreamHandle>) {
        if let Some(mut handle) = slot.take() {
            handle.release();
        }
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            acquired: self.ledger.acquired.load(Ordering::SeqCst),
            released: self.ledger.released.load(Ordering::SeqCst),
        }
    }

    /// Streams acquired but not yet released.
    pub fn active_streams(&self) -> usize {
        self.stats().active()
    }
}
