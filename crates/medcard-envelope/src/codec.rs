use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use medcard_core::{DecodedPayload, EccLevel, EmergencyPayload};

use crate::envelope::Envelope;
use crate::size_guard::{EccProfile, EncodeError, SizeGuard};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Envelope that passed the size guard, ready for the symbol encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckedEnvelope {
    pub envelope: Envelope,
    /// Wire text handed to the symbol encoder.
    pub text: String,
    pub ecc: EccLevel,
}

/// Pack `payload` into an envelope.
///
/// Total: if JSON serialization fails, the debug rendering of the payload is
/// encoded instead so the caller still gets a well-formed envelope.
pub fn encode(payload: &EmergencyPayload) -> Envelope {
    let bytes = match serde_json::to_vec(payload) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("payload serialization failed, encoding debug form: {err}");
            format!("{payload:?}").into_bytes()
        }
    };
    Envelope::wrap(STANDARD.encode(bytes))
}

/// Encode and enforce the capacity budget of `profile`.
///
/// Oversize payloads are rejected as a whole; fields are never truncated.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(payload), fields(ecc = ?profile.level))
)]
pub fn encode_checked(
    payload: &EmergencyPayload,
    profile: &EccProfile,
) -> Result<CheckedEnvelope, EncodeError> {
    let envelope = encode(payload);
    let text = envelope.to_json();
    let guard = SizeGuard::for_profile(profile);
    if let Err(exceeded) = guard.validate(&text) {
        if let Some(level) = guard.suggest_downgrade(&text, profile) {
            log::info!("envelope would fit at {level:?} error correction");
        }
        log::warn!("{exceeded}");
        return Err(exceeded.into());
    }
    log::debug!("encoded envelope: {} chars at {:?}", text.len(), profile.level);
    Ok(CheckedEnvelope {
        envelope,
        text,
        ecc: profile.level,
    })
}

/// Recover a payload from envelope text.
///
/// Never fails: any text that is not a supported envelope wrapping a valid
/// payload comes back as [`DecodedPayload::Raw`] with the input unchanged.
pub fn decode(text: &str) -> DecodedPayload {
    match decode_structured(text) {
        Some(payload) => DecodedPayload::Structured(payload),
        None => DecodedPayload::Raw(text.to_owned()),
    }
}

fn decode_structured(text: &str) -> Option<EmergencyPayload> {
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            log::debug!("not an envelope: {err}");
            return None;
        }
    };
    if !envelope.is_supported() {
        log::debug!(
            "unsupported envelope (i={}, a={}, v={})",
            envelope.source_tag(),
            envelope.algorithm(),
            envelope.version()
        );
        return None;
    }
    let bytes = STANDARD.decode(envelope.payload()).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(payload) => Some(payload),
        Err(err) => {
            log::debug!("envelope payload is not a valid record: {err}");
            None
        }
    }
}
