//! Core types shared by the `medcard-*` crates.
//!
//! This crate is intentionally small. It holds the emergency payload model,
//! the gray frame buffers the scanner samples into, and the [`SymbolCodec`]
//! seam behind which a concrete 2D optical-code implementation lives. It does
//! *not* depend on any particular symbology or camera stack.

mod image;
mod logger;
mod payload;
mod symbol;

pub use image::{GrayImage, GrayImageView};
pub use payload::{DecodedPayload, EmergencyContact, EmergencyPayload};
pub use symbol::{EccLevel, SymbolCodec, SymbolDecode, SymbolError, SymbolLocation, SymbolRaster};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
