//! Scanner session state machine.
//!
//! ```text
//! IDLE -> ACQUIRING -> SCANNING -> DECODED
//!             |            |-----> STOPPED   (stop, hidden, camera switch)
//!             '------------+-----> ERROR     (device failure, track ended)
//! DECODED | STOPPED | ERROR -> ACQUIRING      (restart)
//! ```
//!
//! Hardware callbacks arrive as [`SessionEvent`]s. Each handler computes the
//! next state and performs its acquire/release side effect once. The session
//! owns the stream handle, the sampler schedule, the frame buffer and the
//! overlay canvas; nothing is shared between sessions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use medcard_core::{SymbolCodec, SymbolDecode};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::ScannerConfig;
use crate::device::{
    select_default, CameraBackend, CapabilityError, DeviceDescriptor, DeviceError, DeviceManager,
    StreamHandle,
};
use crate::history::HistoryStore;
use crate::overlay::OverlayRenderer;
use crate::result::{best_effort, ResultHandler, ScanResult};
use crate::sampler::{FrameSampler, TickOutcome};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Confidence reported after a successful decode. Misses report 0.
pub const CONFIDENCE_HIT: u8 = 100;

const TRANSITION_LOG_LIMIT: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Acquiring,
    Scanning,
    Decoded,
    Stopped,
    Error,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Decoded | SessionState::Stopped | SessionState::Error
        )
    }
}

/// Named inputs to the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Start, or restart from a terminal state.
    Start,
    /// Timer fired.
    Tick,
    Stop,
    /// Switch to the given camera, or the next one when `None`.
    SwitchCamera(Option<String>),
    VisibilityChanged { hidden: bool },
    /// The hardware ended the video track.
    TrackEnded,
    /// Restart from a terminal state.
    Reset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Transient, auto-dismissing message (e.g. torch unsupported).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub expires_at_ms: i64,
}

pub struct ScannerSession<B, C> {
    state: SessionState,
    device: Option<DeviceDescriptor>,
    devices: Vec<DeviceDescriptor>,
    preferred_device: Option<String>,
    torch_on: bool,
    confidence: u8,
    last_decoded_at: Option<DateTime<Utc>>,
    last_result: Option<ScanResult>,
    last_error: Option<DeviceError>,
    notice: Option<Notice>,
    transitions: Vec<Transition>,

    stream: Option<StreamHandle>,
    manager: DeviceManager<B>,
    codec: C,
    sampler: FrameSampler,
    overlay: OverlayRenderer,
    canvas: RgbaImage,
    results: ResultHandler,
    clock: Box<dyn Clock>,
    config: ScannerConfig,
}

impl<B: CameraBackend, C: SymbolCodec> ScannerSession<B, C> {
    pub fn new(backend: B, codec: C, results: ResultHandler, config: ScannerConfig) -> Self {
        Self {
            state: SessionState::Idle,
            device: None,
            devices: Vec::new(),
            preferred_device: config.device_id.clone(),
            torch_on: false,
            confidence: 0,
            last_decoded_at: None,
            last_result: None,
            last_error: None,
            notice: None,
            transitions: Vec::new(),
            stream: None,
            manager: DeviceManager::new(backend),
            codec,
            sampler: FrameSampler::new(config.tick_interval()),
            overlay: OverlayRenderer::new(config.overlay.clone()),
            canvas: RgbaImage::new(0, 0),
            results,
            clock: Box::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Feed one event and return the resulting state.
    pub fn handle(&mut self, event: SessionEvent) -> SessionState {
        log::trace!("event {event:?} in {:?}", self.state);
        match event {
            SessionEvent::Start => self.start(),
            SessionEvent::Tick => self.tick(),
            SessionEvent::Stop => self.stop(),
            SessionEvent::SwitchCamera(target) => self.switch_camera(target.as_deref()),
            SessionEvent::VisibilityChanged { hidden } => self.set_hidden(hidden),
            SessionEvent::TrackEnded => self.track_ended(),
            SessionEvent::Reset => self.reset(),
        }
        self.state
    }

    /// IDLE -> ACQUIRING -> SCANNING | ERROR. From a terminal state this is
    /// a restart; while acquiring or scanning it is ignored.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn start(&mut self) {
        match self.state {
            SessionState::Idle => {}
            SessionState::Acquiring | SessionState::Scanning => {
                log::debug!("start ignored: session already {:?}", self.state);
                return;
            }
            SessionState::Decoded | SessionState::Stopped | SessionState::Error => {
                self.clear_for_restart();
            }
        }
        self.transition(SessionState::Acquiring);
        let preferred = self.preferred_device.clone();
        self.acquire_and_scan(preferred.as_deref());
    }

    /// Restart from a terminal state.
    pub fn reset(&mut self) {
        if self.state.is_terminal() {
            self.start();
        } else {
            log::debug!("reset ignored in {:?}", self.state);
        }
    }

    /// SCANNING -> STOPPED. Safe to call in any state.
    pub fn stop(&mut self) {
        match self.state {
            SessionState::Acquiring | SessionState::Scanning => {
                self.stop_scanning();
                self.transition(SessionState::Stopped);
            }
            _ => {
                self.sampler.cancel();
                self.manager.release(&mut self.stream);
            }
        }
    }

    /// Hiding the surface stops the session; showing it again does not
    /// restart.
    pub fn set_hidden(&mut self, hidden: bool) {
        if hidden && self.state == SessionState::Scanning {
            log::info!("surface hidden, stopping scanner");
            self.stop_scanning();
            self.transition(SessionState::Stopped);
        }
    }

    /// Release the current camera, then acquire `target` (or the next
    /// enumerated camera). Outside SCANNING this only records the preference
    /// for the next start.
    pub fn switch_camera(&mut self, target: Option<&str>) {
        let next = match target {
            Some(id) => Some(id.to_owned()),
            None => self.next_device_id(),
        };
        if self.state != SessionState::Scanning {
            self.preferred_device = next;
            return;
        }
        self.stop_scanning();
        self.transition(SessionState::Stopped);
        self.confidence = 0;
        self.preferred_device = next;
        self.transition(SessionState::Acquiring);
        let preferred = self.preferred_device.clone();
        self.acquire_and_scan(preferred.as_deref());
    }

    pub fn track_ended(&mut self) {
        if self.state == SessionState::Scanning {
            self.fail(DeviceError::Other("camera stream ended".into()));
        }
    }

    /// Run the pending tick if it is due.
    pub fn tick(&mut self) {
        if self.state != SessionState::Scanning {
            return;
        }
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();
        let Some(token) = self.sampler.poll(now_ms) else {
            return;
        };
        if !self.stream.as_ref().is_some_and(|s| s.is_live()) {
            self.track_ended();
            return;
        }

        let outcome = match self.stream.as_mut().and_then(|s| s.video()) {
            Some(track) => self.sampler.sample(token, now_ms, track, &self.codec),
            None => {
                self.track_ended();
                return;
            }
        };

        match outcome {
            TickOutcome::Stale => {}
            TickOutcome::Miss => {
                self.confidence = 0;
                self.render_overlay(now_ms);
            }
            TickOutcome::Hit(decode) => self.on_hit(decode, now),
            TickOutcome::CaptureFailed(err) => self.fail(err),
        }
    }

    /// Poll until the session leaves SCANNING, sleeping on the clock between
    /// ticks. `max_ticks` bounds the number of polls.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn run_until_settled(&mut self, max_ticks: Option<u64>) -> SessionState {
        let mut polls = 0u64;
        while self.state == SessionState::Scanning {
            if max_ticks.is_some_and(|max| polls >= max) {
                log::debug!("tick budget of {polls} exhausted");
                break;
            }
            if let Some(due) = self.sampler.next_due_ms() {
                let wait = due - self.clock.now_ms();
                if wait > 0 {
                    self.clock.sleep(Duration::from_millis(wait as u64));
                }
            }
            self.tick();
            polls += 1;
        }
        self.state
    }

    /// Toggle the torch. Unsupported torches raise a transient notice and
    /// leave scanning untouched.
    pub fn toggle_torch(&mut self) -> Result<bool, CapabilityError> {
        let want = !self.torch_on;
        let outcome = match (self.state, self.stream.as_mut()) {
            (SessionState::Scanning, Some(stream)) => stream.set_torch(want).map(|()| want),
            _ => Err(CapabilityError::NoActiveStream),
        };
        match outcome {
            Ok(on) => {
                self.torch_on = on;
                log::debug!("torch {}", if on { "on" } else { "off" });
                Ok(on)
            }
            Err(err) => {
                let notice_ms = i64::try_from(self.config.notice_ms).unwrap_or(i64::MAX);
                self.notice = Some(Notice {
                    message: err.to_string(),
                    expires_at_ms: self.clock.now_ms().saturating_add(notice_ms),
                });
                log::info!("{err}");
                Err(err)
            }
        }
    }

    /// The current notice, dismissed once expired.
    pub fn active_notice(&mut self) -> Option<&Notice> {
        let now_ms = self.clock.now_ms();
        if self.notice.as_ref().is_some_and(|n| now_ms >= n.expires_at_ms) {
            self.notice = None;
        }
        self.notice.as_ref()
    }

    /// Run follow-up work on the decoded result, outside the scanning loop.
    ///
    /// Only runs in DECODED. A failure is logged and never changes the
    /// session state.
    pub fn enrich<T, E: std::fmt::Display>(
        &self,
        f: impl FnOnce(&ScanResult) -> Result<T, E>,
    ) -> Option<T> {
        if self.state != SessionState::Decoded {
            return None;
        }
        let result = self.last_result.as_ref()?;
        match f(result) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("enrichment failed: {err}");
                None
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn last_decoded_at(&self) -> Option<DateTime<Utc>> {
        self.last_decoded_at
    }

    pub fn last_result(&self) -> Option<&ScanResult> {
        self.last_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&DeviceError> {
        self.last_error.as_ref()
    }

    /// User-facing text for the last device failure.
    pub fn error_message(&self) -> Option<String> {
        self.last_error.as_ref().map(DeviceError::user_message)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn device_manager(&self) -> &DeviceManager<B> {
        &self.manager
    }

    pub fn device_manager_mut(&mut self) -> &mut DeviceManager<B> {
        &mut self.manager
    }

    pub fn history(&self) -> &HistoryStore {
        self.results.history()
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        self.results.history_mut()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    fn acquire_and_scan(&mut self, preferred: Option<&str>) {
        let devices = match self.manager.list_devices() {
            Ok(devices) => devices,
            Err(err) => return self.fail(err),
        };
        self.devices = devices;

        let chosen = preferred
            .and_then(|id| {
                let found = self.devices.iter().find(|d| d.id == id);
                if found.is_none() {
                    log::warn!("camera {id} not available, using default");
                }
                found
            })
            .or_else(|| select_default(&self.devices))
            .cloned();
        let Some(device) = chosen else {
            return self.fail(DeviceError::DeviceNotFound);
        };

        let dims = match self
            .manager
            .acquire(&mut self.stream, Some(&device), &self.config.constraints)
        {
            Ok(handle) => handle.video().map(|t| t.dimensions()),
            Err(err) => return self.fail(err),
        };
        let Some((w, h)) = dims else {
            return self.fail(DeviceError::DeviceUnsupported);
        };
        if (self.canvas.width() as usize, self.canvas.height() as usize) != (w, h) {
            self.canvas = RgbaImage::new(w as u32, h as u32);
        }

        self.device = Some(device);
        self.sampler.start(self.clock.now_ms());
        self.transition(SessionState::Scanning);
    }

    fn on_hit(&mut self, decode: SymbolDecode, now: DateTime<Utc>) {
        self.sampler.cancel();
        self.confidence = CONFIDENCE_HIT;
        self.last_decoded_at = Some(now);
        let (result, _entry) = self.results.handle(decode, now);
        self.last_result = Some(result);
        self.torch_off();
        self.manager.release(&mut self.stream);
        self.transition(SessionState::Decoded);
    }

    fn fail(&mut self, err: DeviceError) {
        log::warn!("scanner error: {err}");
        self.stop_scanning();
        self.last_error = Some(err);
        self.transition(SessionState::Error);
    }

    fn stop_scanning(&mut self) {
        self.sampler.cancel();
        self.torch_off();
        self.manager.release(&mut self.stream);
    }

    fn torch_off(&mut self) {
        if !self.torch_on {
            return;
        }
        if let Some(stream) = self.stream.as_mut() {
            best_effort("torch off", || stream.set_torch(false));
        }
        self.torch_on = false;
    }

    fn clear_for_restart(&mut self) {
        self.stop_scanning();
        self.device = None;
        self.confidence = 0;
        self.last_decoded_at = None;
        self.last_result = None;
        self.last_error = None;
        self.notice = None;
    }

    fn next_device_id(&self) -> Option<String> {
        if self.devices.is_empty() {
            return None;
        }
        let current = self
            .device
            .as_ref()
            .and_then(|d| self.devices.iter().position(|x| x.id == d.id));
        let next = current.map_or(0, |i| (i + 1) % self.devices.len());
        Some(self.devices[next].id.clone())
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        log::info!("scanner: {from:?} -> {to:?}");
        if self.transitions.len() == TRANSITION_LOG_LIMIT {
            self.transitions.remove(0);
        }
        self.transitions.push(Transition { from, to });
        self.state = to;
        let now_ms = self.clock.now_ms();
        self.render_overlay(now_ms);
    }

    fn render_overlay(&mut self, now_ms: i64) {
        let location = self.last_result.as_ref().and_then(|r| r.location);
        self.overlay
            .render(&mut self.canvas, self.state, now_ms, location.as_ref());
    }
}

impl<B, C> Drop for ScannerSession<B, C> {
    fn drop(&mut self) {
        self.sampler.cancel();
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
    }
}
