//! Issuance of emergency-identity card codes.
//!
//! [`render_card_code`] runs the full issuance path: envelope encoding under
//! the capacity budget of the requested presentation contexts, symbol
//! rendering through an injected [`SymbolCodec`](medcard_core::SymbolCodec),
//! and composition of a printable gray raster with a quiet zone. Nothing is
//! rendered when the envelope does not fit.

mod card;
mod config;
mod io;

pub use card::{rasterize, render_card_code, CardCode};
pub use config::IssueConfig;
pub use io::write_gray_png;

#[derive(thiserror::Error, Debug)]
pub enum PrintError {
    #[error(transparent)]
    Encode(#[from] medcard_envelope::EncodeError),
    #[error(transparent)]
    Symbol(#[from] medcard_core::SymbolError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Png(#[from] png::EncodingError),
    #[error("invalid issue config: {0}")]
    InvalidConfig(String),
}
