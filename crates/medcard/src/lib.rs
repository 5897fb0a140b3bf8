//! High-level facade crate for the `medcard-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the underlying crates,
//! - (feature `qr`) a QR Code [`SymbolCodec`](core::SymbolCodec) and
//!   end-to-end helpers that issue a card code from a payload or read one
//!   back from an image file.
//!
//! ## Quickstart
//!
//! ```no_run
//! use medcard::core::EmergencyPayload;
//! use medcard::print::IssueConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let payload = EmergencyPayload {
//!     name: Some("Asha K.".into()),
//!     blood_group: Some("O-".into()),
//!     ..EmergencyPayload::default()
//! };
//! let card = medcard::qr::issue(&payload, &IssueConfig::default())?;
//! card.write_png("card.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `medcard::core`: payload model, gray frames, symbol codec seam, logger.
//! - `medcard::envelope`: envelope encode/decode and the size guard.
//! - `medcard::scanner`: camera lifecycle, frame sampling, overlay, history,
//!   the scanner session state machine.
//! - `medcard::print`: card-code rasters and PNG output.
//! - `medcard::qr` (feature `qr`): QR Code symbol codec.

pub use medcard_core as core;
pub use medcard_envelope as envelope;
pub use medcard_print as print;
pub use medcard_scanner as scanner;

pub use medcard_core::{DecodedPayload, EmergencyContact, EmergencyPayload};
pub use medcard_envelope::{decode, encode, encode_checked};

#[cfg(feature = "qr")]
pub mod qr;
