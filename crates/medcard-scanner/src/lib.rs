//! Live scanning engine for emergency-identity optical codes.
//!
//! Pieces, leaves first:
//! - [`DeviceManager`]: camera enumeration and exclusive, idempotently
//!   released [`StreamHandle`]s over a [`CameraBackend`],
//! - [`FrameSampler`]: single-threaded polling loop, one capture plus one
//!   decode per tick, cancellable by generation,
//! - [`OverlayRenderer`]: scan target, corner markers and sweeping scan line,
//! - [`ResultHandler`] and [`HistoryStore`]: permissive interpretation of the
//!   decoded text and a bounded, atomically persisted history,
//! - [`ScannerSession`]: the state machine that owns all of the above.
//!
//! The optical-code primitive is injected as a
//! [`SymbolCodec`](medcard_core::SymbolCodec); this crate never decodes a
//! symbol itself.

mod clock;
mod config;
mod device;
mod history;
mod overlay;
mod result;
mod sampler;
mod sequence;
mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ScannerConfig, ScannerConfigError};
pub use device::{
    is_rear_facing_label, select_default, CameraBackend, CapabilityError, DeviceDescriptor,
    DeviceError, DeviceInfo, DeviceManager, StreamConstraints, StreamHandle, StreamStats,
    VideoTrack,
};
pub use history::{
    export_file_name, local_export_date, FileStore, HistoryEntry, HistoryError, HistoryStore, KeyValueStore,
    MemoryStore, HISTORY_KEY, HISTORY_LIMIT,
};
pub use overlay::{scan_line_y, state_color, OverlayParams, OverlayRenderer, TargetRect};
pub use result::{
    best_effort, interpret, Feedback, FeedbackError, ResultHandler, ScanResult, Silent,
    TerminalBell,
};
pub use sampler::{FrameSampler, TickOutcome, TickToken};
pub use sequence::{load_gray, SequenceBackend, SequenceDevice, SequenceLoadError};
pub use session::{
    Notice, ScannerSession, SessionEvent, SessionState, Transition, CONFIDENCE_HIT,
};
