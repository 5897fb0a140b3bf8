//! Envelope codec for emergency payloads.
//!
//! Issuing side:
//! - [`encode`] packs an [`EmergencyPayload`](medcard_core::EmergencyPayload)
//!   into a versioned [`Envelope`] (compact JSON, base64, scheme tags),
//! - [`SizeGuard`] checks the envelope text against the capacity budget of
//!   the chosen [`EccProfile`] before anything is rendered,
//! - [`encode_checked`] does both and fails loudly on oversize input.
//!
//! Reading side:
//! - [`decode`] recovers the payload, degrading to
//!   [`DecodedPayload::Raw`](medcard_core::DecodedPayload::Raw) for anything
//!   that is not a well-formed envelope of this scheme. It never fails.

mod codec;
mod envelope;
mod size_guard;

pub use codec::{decode, encode, encode_checked, CheckedEnvelope};
pub use envelope::{
    Envelope, EnvelopeError, ALGORITHM, SCHEMA_VERSION, SOURCE_TAG, SUPPORTED_MAJOR_VERSION,
};
pub use size_guard::{
    validate, EccProfile, EncodeError, PresentationContext, SizeExceeded, SizeGuard,
    MAX_ENVELOPE_CHARS,
};
