//! QR Code symbology behind [`SymbolCodec`].
//!
//! Rendering uses `qrcode`, detection and decoding use `rqrr`.

use std::path::Path;

use medcard_core::{
    EccLevel, EmergencyPayload, GrayImageView, SymbolCodec, SymbolDecode, SymbolError,
    SymbolLocation, SymbolRaster,
};
use medcard_print::{render_card_code, CardCode, IssueConfig, PrintError};
use medcard_scanner::{load_gray, Clock, ScanResult, SequenceLoadError, SystemClock};
use nalgebra::Point2;
use qrcode::types::{Color, EcLevel, QrError};
use qrcode::QrCode;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Copy, Debug, Default)]
pub struct QrSymbolCodec;

fn ec_level(level: EccLevel) -> EcLevel {
    match level {
        EccLevel::Low => EcLevel::L,
        EccLevel::Medium => EcLevel::M,
        EccLevel::Quartile => EcLevel::Q,
        EccLevel::High => EcLevel::H,
    }
}

impl SymbolCodec for QrSymbolCodec {
    fn render(&self, data: &[u8], ecc: EccLevel) -> Result<SymbolRaster, SymbolError> {
        let code = QrCode::with_error_correction_level(data, ec_level(ecc)).map_err(|err| {
            match err {
                QrError::DataTooLong => SymbolError::DataTooLong {
                    len: data.len(),
                    capacity: ecc.byte_capacity(),
                    ecc,
                },
                other => SymbolError::Render(other.to_string()),
            }
        })?;
        let modules = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        Ok(SymbolRaster {
            width: code.width(),
            modules,
            ecc,
        })
    }

    fn decode(&self, frame: &GrayImageView<'_>) -> Option<SymbolDecode> {
        if frame.width == 0 || frame.height == 0 {
            return None;
        }
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width,
            frame.height,
            |x, y| frame.get(x, y).unwrap_or(255),
        );
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, text)) => {
                    let corners = grid.bounds.map(|p| Point2::new(p.x as f32, p.y as f32));
                    return Some(SymbolDecode {
                        text,
                        location: Some(SymbolLocation { corners }),
                    });
                }
                Err(err) => log::trace!("qr grid rejected: {err}"),
            }
        }
        None
    }
}

/// Issue a QR card code for `payload`.
pub fn issue(payload: &EmergencyPayload, cfg: &IssueConfig) -> Result<CardCode, PrintError> {
    render_card_code(payload, cfg, &QrSymbolCodec)
}

/// Read the first QR code found in an image file. `Ok(None)` when the image
/// holds no readable code.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(path)))]
pub fn read_image(path: impl AsRef<Path>) -> Result<Option<ScanResult>, SequenceLoadError> {
    let frame = load_gray(path.as_ref())?;
    Ok(QrSymbolCodec
        .decode(&frame.view())
        .map(|hit| ScanResult::from_decode(hit, SystemClock.now())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medcard_core::GrayImage;
    use medcard_print::rasterize;

    #[test]
    fn render_then_detect() {
        let raster = QrSymbolCodec
            .render(b"hello medcard", EccLevel::Quartile)
            .expect("render");
        assert_eq!(raster.modules.len(), raster.width * raster.width);
        let img: GrayImage = rasterize(&raster, 6, 4);
        let hit = QrSymbolCodec.decode(&img.view()).expect("decode");
        assert_eq!(hit.text, "hello medcard");
        let center = hit.location.expect("location").center();
        let mid = img.width as f32 / 2.0;
        assert!((center.x - mid).abs() < 6.0 && (center.y - mid).abs() < 6.0);
    }

    #[test]
    fn blank_frame_has_no_code() {
        let img = GrayImage {
            width: 40,
            height: 40,
            data: vec![255; 1600],
        };
        assert!(QrSymbolCodec.decode(&img.view()).is_none());
    }

    #[test]
    fn oversized_data_is_reported() {
        let data = vec![b'x'; 4000];
        assert!(matches!(
            QrSymbolCodec.render(&data, EccLevel::High),
            Err(SymbolError::DataTooLong { .. })
        ));
    }
}
