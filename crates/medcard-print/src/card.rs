use std::path::Path;

use medcard_core::{EmergencyPayload, GrayImage, SymbolCodec, SymbolRaster};
use medcard_envelope::{encode_checked, CheckedEnvelope};

use crate::config::IssueConfig;
use crate::io::write_gray_png;
use crate::PrintError;

#[cfg(feature = "tracing")]
use tracing::instrument;

const DARK: u8 = 0;
const LIGHT: u8 = 255;

/// An issued card code: the checked envelope, its symbol and the printable
/// raster.
#[derive(Clone, Debug)]
pub struct CardCode {
    pub envelope: CheckedEnvelope,
    pub raster: SymbolRaster,
    pub image: GrayImage,
}

impl CardCode {
    /// Text carried by the symbol.
    pub fn text(&self) -> &str {
        &self.envelope.text
    }

    pub fn write_png(&self, path: impl AsRef<Path>) -> Result<(), PrintError> {
        write_gray_png(&self.image, path)
    }
}

/// Encode `payload`, render it with `codec` at the profile's error-correction
/// level, and compose the printable raster.
///
/// Fails with [`PrintError::Encode`] before any rendering when the envelope
/// exceeds the profile's budget.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(payload, codec), fields(module_px = cfg.module_px))
)]
pub fn render_card_code<C: SymbolCodec + ?Sized>(
    payload: &EmergencyPayload,
    cfg: &IssueConfig,
    codec: &C,
) -> Result<CardCode, PrintError> {
    cfg.validate()?;
    let envelope = encode_checked(payload, &cfg.profile())?;
    let raster = codec.render(envelope.text.as_bytes(), envelope.ecc)?;
    let image = rasterize(&raster, cfg.module_px, cfg.quiet_zone);
    log::info!(
        "issued card code: {} chars, {} modules, {}x{} px",
        envelope.text.len(),
        raster.width,
        image.width,
        image.height
    );
    Ok(CardCode {
        envelope,
        raster,
        image,
    })
}

/// Scale `raster` to `module_px` pixels per module and surround it with
/// `quiet_zone` light modules.
pub fn rasterize(raster: &SymbolRaster, module_px: u32, quiet_zone: u32) -> GrayImage {
    let px = module_px.max(1) as usize;
    let qz = quiet_zone as usize;
    let side = (raster.width + 2 * qz) * px;
    let mut img = GrayImage {
        width: side,
        height: side,
        data: vec![LIGHT; side * side],
    };
    for my in 0..raster.width {
        for mx in 0..raster.width {
            if !raster.is_dark(mx, my) {
                continue;
            }
            let x0 = (mx + qz) * px;
            let y0 = (my + qz) * px;
            for y in y0..y0 + px {
                img.data[y * side + x0..y * side + x0 + px].fill(DARK);
            }
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcard_core::EccLevel;

    fn checker(width: usize) -> SymbolRaster {
        SymbolRaster {
            width,
            modules: (0..width * width).map(|i| (i / width + i % width) % 2 == 0).collect(),
            ecc: EccLevel::Medium,
        }
    }

    #[test]
    fn quiet_zone_is_light() {
        let img = rasterize(&checker(3), 2, 1);
        assert_eq!((img.width, img.height), (10, 10));
        let view = img.view();
        for i in 0..10 {
            assert_eq!(view.get(i, 0), Some(LIGHT));
            assert_eq!(view.get(0, i), Some(LIGHT));
            assert_eq!(view.get(i, 9), Some(LIGHT));
        }
    }

    #[test]
    fn modules_scale_to_blocks() {
        let img = rasterize(&checker(3), 2, 1);
        let view = img.view();
        // module (0,0) is dark and covers pixels 2..4
        assert_eq!(view.get(2, 2), Some(DARK));
        assert_eq!(view.get(3, 3), Some(DARK));
        // module (1,0) is light
        assert_eq!(view.get(4, 2), Some(LIGHT));
    }
}
