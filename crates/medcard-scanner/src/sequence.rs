//! File-backed camera that replays still frames.
//!
//! Used by the command-line `scan` command and in tests: each virtual device
//! owns a list of gray frames that its track serves in a loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use medcard_core::GrayImage;

use crate::device::{
    CameraBackend, CapabilityError, DeviceError, DeviceInfo, StreamConstraints, VideoTrack,
};

#[derive(thiserror::Error, Debug)]
pub enum SequenceLoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no image frames found in {0}")]
    Empty(PathBuf),
}

/// One replayable virtual camera.
#[derive(Clone, Debug)]
pub struct SequenceDevice {
    pub id: String,
    pub label: String,
    pub frames: Arc<Vec<GrayImage>>,
    pub torch: bool,
}

impl SequenceDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>, frames: Vec<GrayImage>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            frames: Arc::new(frames),
            torch: false,
        }
    }

    pub fn with_torch(mut self, torch: bool) -> Self {
        self.torch = torch;
        self
    }

    /// Load every `.png`/`.jpg`/`.jpeg` in `dir`, sorted by file name.
    pub fn from_dir(
        id: impl Into<String>,
        label: impl Into<String>,
        dir: impl AsRef<Path>,
    ) -> Result<Self, SequenceLoadError> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_frame_file(p))
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(SequenceLoadError::Empty(dir.to_path_buf()));
        }

        let mut frames = Vec::with_capacity(paths.len());
        for path in paths {
            frames.push(load_gray(&path)?);
        }
        log::info!("loaded {} frame(s) from {}", frames.len(), dir.display());
        Ok(Self::new(id, label, frames))
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| matches!(e.as_str(), "png" | "jpg" | "jpeg"))
}

/// Load any supported image file as an 8-bit gray frame.
pub fn load_gray(path: &Path) -> Result<GrayImage, SequenceLoadError> {
    let img = image::open(path)
        .map_err(|source| SequenceLoadError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();
    Ok(GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.into_raw(),
    })
}

/// Backend over a fixed set of [`SequenceDevice`]s.
#[derive(Clone, Debug, Default)]
pub struct SequenceBackend {
    devices: Vec<SequenceDevice>,
    /// Fail enumeration and open with `PermissionDenied`.
    pub deny_permission: bool,
    /// End every opened track after this many captures.
    pub end_after: Option<usize>,
}

impl SequenceBackend {
    pub fn new(devices: Vec<SequenceDevice>) -> Self {
        Self {
            devices,
            deny_permission: false,
            end_after: None,
        }
    }

    pub fn devices(&self) -> &[SequenceDevice] {
        &self.devices
    }
}

impl CameraBackend for SequenceBackend {
    fn enumerate(&mut self) -> Result<Vec<DeviceInfo>, DeviceError> {
        if self.deny_permission {
            return Err(DeviceError::PermissionDenied);
        }
        Ok(self
            .devices
            .iter()
            .map(|d| DeviceInfo {
                id: d.id.clone(),
                label: d.label.clone(),
            })
            .collect())
    }

    fn open(
        &mut self,
        device_id: &str,
        _constraints: &StreamConstraints,
    ) -> Result<Vec<Box<dyn VideoTrack>>, DeviceError> {
        if self.deny_permission {
            return Err(DeviceError::PermissionDenied);
        }
        let device = self
            .devices
            .iter()
            .find(|d| d.id == device_id)
            .ok_or(DeviceError::DeviceNotFound)?;
        if device.frames.is_empty() {
            return Err(DeviceError::DeviceUnsupported);
        }
        Ok(vec![Box::new(SequenceTrack {
            frames: Arc::clone(&device.frames),
            cursor: 0,
            captured: 0,
            end_after: self.end_after,
            torch_supported: device.torch,
            torch_on: false,
            stopped: false,
        })])
    }
}

struct SequenceTrack {
    frames: Arc<Vec<GrayImage>>,
    cursor: usize,
    captured: usize,
    end_after: Option<usize>,
    torch_supported: bool,
    torch_on: bool,
    stopped: bool,
}

impl VideoTrack for SequenceTrack {
    fn dimensions(&self) -> (usize, usize) {
        let frame = &self.frames[self.cursor % self.frames.len()];
        (frame.width, frame.height)
    }

    fn capture(&mut self, buffer: &mut GrayImage) -> Result<(), DeviceError> {
        if !self.is_live() {
            return Err(DeviceError::Other("track ended".into()));
        }
        let frame = &self.frames[self.cursor % self.frames.len()];
        buffer.ensure_size(frame.width, frame.height);
        buffer.data.copy_from_slice(&frame.data);
        self.cursor = (self.cursor + 1) % self.frames.len();
        self.captured += 1;
        Ok(())
    }

    fn is_live(&self) -> bool {
        !self.stopped && self.end_after.map_or(true, |n| self.captured < n)
    }

    fn supports_torch(&self) -> bool {
        self.torch_supported
    }

    fn set_torch(&mut self, on: bool) -> Result<(), CapabilityError> {
        if !self.torch_supported {
            return Err(CapabilityError::TorchUnsupported);
        }
        self.torch_on = on;
        Ok(())
    }

    fn stop(&mut self) {
        self.torch_on = false;
        self.stopped = true;
    }
}
