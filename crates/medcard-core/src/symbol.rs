//! Seam to the external 2D optical-code primitive.
//!
//! The symbology itself (module placement, Reed-Solomon, finder patterns) is
//! not implemented in this workspace. Anything that can map bytes plus an
//! error-correction strength to a module grid, and a gray frame back to text,
//! can be plugged in through [`SymbolCodec`].

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::GrayImageView;

/// Error-correction strength, weakest to strongest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EccLevel {
    Low,
    #[default]
    Medium,
    Quartile,
    High,
}

impl EccLevel {
    pub const ALL: [EccLevel; 4] = [
        EccLevel::Low,
        EccLevel::Medium,
        EccLevel::Quartile,
        EccLevel::High,
    ];

    /// Largest byte-mode payload a single symbol can hold at this level
    /// (QR version 40).
    pub fn byte_capacity(self) -> usize {
        match self {
            EccLevel::Low => 2953,
            EccLevel::Medium => 2331,
            EccLevel::Quartile => 1663,
            EccLevel::High => 1273,
        }
    }
}

/// Square module grid produced by [`SymbolCodec::render`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolRaster {
    /// Modules per side.
    pub width: usize,
    /// Row-major, `true` = dark module.
    pub modules: Vec<bool>,
    pub ecc: EccLevel,
}

impl SymbolRaster {
    #[inline]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }
}

/// Quad of a detected symbol in frame pixels (TL, TR, BR, BL).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub corners: [Point2<f32>; 4],
}

impl SymbolLocation {
    pub fn center(&self) -> Point2<f32> {
        let (sx, sy) = self
            .corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx / 4.0, sy / 4.0)
    }
}

/// One successful read from a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolDecode {
    pub text: String,
    pub location: Option<SymbolLocation>,
}

#[derive(thiserror::Error, Debug)]
pub enum SymbolError {
    #[error("data does not fit in one symbol ({len} bytes, capacity {capacity} at {ecc:?})")]
    DataTooLong {
        len: usize,
        capacity: usize,
        ecc: EccLevel,
    },
    #[error("symbol encoder failed: {0}")]
    Render(String),
}

/// External optical-code encode/decode primitive.
pub trait SymbolCodec {
    /// Encode `data` into a module grid at the requested strength.
    fn render(&self, data: &[u8], ecc: EccLevel) -> Result<SymbolRaster, SymbolError>;

    /// Try to read one symbol from `frame`. `None` is a miss.
    fn decode(&self, frame: &GrayImageView<'_>) -> Option<SymbolDecode>;
}

impl<T: SymbolCodec + ?Sized> SymbolCodec for &T {
    fn render(&self, data: &[u8], ecc: EccLevel) -> Result<SymbolRaster, SymbolError> {
        (**self).render(data, ecc)
    }

    fn decode(&self, frame: &GrayImageView<'_>) -> Option<SymbolDecode> {
        (**self).decode(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecc_levels_order_by_strength() {
        assert!(EccLevel::High > EccLevel::Quartile);
        assert!(EccLevel::Low < EccLevel::Medium);
        for w in EccLevel::ALL.windows(2) {
            assert!(w[0].byte_capacity() > w[1].byte_capacity());
        }
    }

    #[test]
    fn location_center_is_mean_of_corners() {
        let loc = SymbolLocation {
            corners: [
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
            ],
        };
        assert_eq!(loc.center(), Point2::new(5.0, 5.0));
    }
}
