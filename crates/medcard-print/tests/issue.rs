use std::cell::Cell;

use medcard_core::{
    EccLevel, EmergencyContact, EmergencyPayload, GrayImageView, SymbolCodec, SymbolDecode,
    SymbolError, SymbolRaster,
};
use medcard_envelope::{EncodeError, PresentationContext};
use medcard_print::{render_card_code, IssueConfig, PrintError};

/// Renders one module per input byte, dark for odd bytes, and counts calls.
#[derive(Default)]
struct ByteGridCodec {
    renders: Cell<usize>,
}

impl SymbolCodec for ByteGridCodec {
    fn render(&self, data: &[u8], ecc: EccLevel) -> Result<SymbolRaster, SymbolError> {
        self.renders.set(self.renders.get() + 1);
        let width = (data.len() as f64).sqrt().ceil() as usize;
        let mut modules = vec![false; width * width];
        for (m, b) in modules.iter_mut().zip(data) {
            *m = b % 2 == 1;
        }
        Ok(SymbolRaster {
            width,
            modules,
            ecc,
        })
    }

    fn decode(&self, _frame: &GrayImageView<'_>) -> Option<SymbolDecode> {
        None
    }
}

fn payload() -> EmergencyPayload {
    EmergencyPayload {
        id: Some("card-7".into()),
        name: Some("M. Lindqvist".into()),
        blood_group: Some("AB+".into()),
        medications: Some(vec!["warfarin".into()]),
        emergency_contact: Some(EmergencyContact {
            name: Some("J. Lindqvist".into()),
            phone: Some("+46 70 000 00 00".into()),
            ..EmergencyContact::default()
        }),
        ..EmergencyPayload::default()
    }
}

#[test]
fn issued_code_carries_decodable_envelope() {
    let codec = ByteGridCodec::default();
    let cfg = IssueConfig::default();
    let card = render_card_code(&payload(), &cfg, &codec).expect("issue");

    assert_eq!(card.raster.ecc, EccLevel::High);
    let side = (card.raster.width + 8) * 8;
    assert_eq!((card.image.width, card.image.height), (side, side));

    let decoded = medcard_envelope::decode(card.text());
    assert_eq!(decoded.as_structured(), Some(&payload()));
}

#[test]
fn oversized_payload_renders_nothing() {
    let codec = ByteGridCodec::default();
    let big = EmergencyPayload {
        allergies: Some(
            (0..50)
                .map(|i| format!("allergy number {i} with a long free-text reaction note"))
                .collect(),
        ),
        ..payload()
    };
    let err = render_card_code(&big, &IssueConfig::default(), &codec).expect_err("too big");
    assert!(matches!(
        err,
        PrintError::Encode(EncodeError::SizeExceeded(_))
    ));
    assert_eq!(codec.renders.get(), 0);
}

#[test]
fn png_is_written() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("card.png");
    let cfg = IssueConfig {
        contexts: vec![PresentationContext::InApp],
        module_px: 2,
        quiet_zone: 4,
    };
    let card = render_card_code(&payload(), &cfg, &ByteGridCodec::default()).expect("issue");
    assert_eq!(card.envelope.ecc, EccLevel::Medium);
    card.write_png(&path).expect("png");
    assert!(std::fs::metadata(&path).expect("meta").len() > 0);
}
