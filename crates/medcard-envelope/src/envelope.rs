//! Wire-level envelope: `{"e": .., "i": .., "a": .., "v": ..}`.

use serde::{Deserialize, Serialize};

/// Constant scheme identifier written to `i`.
pub const SOURCE_TAG: &str = "MEDCARD";
/// Binary-to-text transform applied to the payload, written to `a`.
pub const ALGORITHM: &str = "base64";
/// Current schema version, written to `v`.
pub const SCHEMA_VERSION: &str = "1.0";
/// Newest major schema version this reader understands.
pub const SUPPORTED_MAJOR_VERSION: u32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum EnvelopeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("envelope field `{0}` is empty")]
    EmptyField(&'static str),
}

/// Versioned wrapper around the encoded payload bytes.
///
/// Fields are private: an envelope is immutable once produced. All four are
/// guaranteed non-empty for envelopes built by this crate or accepted by
/// [`Envelope::from_json`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "e")]
    payload: String,
    #[serde(rename = "i")]
    source_tag: String,
    #[serde(rename = "a")]
    algorithm: String,
    #[serde(rename = "v")]
    version: String,
}

impl Envelope {
    /// Wrap already-transformed payload text with this scheme's tags.
    pub(crate) fn wrap(payload: String) -> Self {
        Self {
            payload,
            source_tag: SOURCE_TAG.to_owned(),
            algorithm: ALGORITHM.to_owned(),
            version: SCHEMA_VERSION.to_owned(),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Parse wire text. Unknown keys are tolerated; any of the four required
    /// keys missing or empty is an error.
    pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
        let env: Envelope = serde_json::from_str(text)?;
        for (name, value) in [
            ("e", &env.payload),
            ("i", &env.source_tag),
            ("a", &env.algorithm),
            ("v", &env.version),
        ] {
            if value.is_empty() {
                return Err(EnvelopeError::EmptyField(name));
            }
        }
        Ok(env)
    }

    /// Compact wire text with exactly the four envelope keys.
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "e": self.payload,
            "i": self.source_tag,
            "a": self.algorithm,
            "v": self.version,
        })
        .to_string()
    }

    /// Major component of `version`, if it parses.
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next()?.trim().parse().ok()
    }

    /// True if this reader can unwrap the envelope: same scheme tag, same
    /// algorithm, and a major version no newer than the supported one.
    pub fn is_supported(&self) -> bool {
        self.source_tag == SOURCE_TAG
            && self.algorithm == ALGORITHM
            && self
                .major_version()
                .is_some_and(|major| major <= SUPPORTED_MAJOR_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_has_exactly_four_keys() {
        let env = Envelope::wrap("e30=".into());
        let value: serde_json::Value = serde_json::from_str(&env.to_json()).expect("json");
        let obj = value.as_object().expect("object");
        let mut keys: Vec<_> = obj.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["a", "e", "i", "v"]);
        assert_eq!(obj["v"], "1.0");
    }

    #[test]
    fn tolerates_unknown_keys() {
        let text = r#"{"e":"e30=","i":"MEDCARD","a":"base64","v":"1.0","x":42}"#;
        let env = Envelope::from_json(text).expect("envelope");
        assert_eq!(env.payload(), "e30=");
        assert!(env.is_supported());
    }

    #[test]
    fn missing_or_empty_key_is_rejected() {
        assert!(Envelope::from_json(r#"{"e":"e30=","i":"MEDCARD","a":"base64"}"#).is_err());
        let err = Envelope::from_json(r#"{"e":"","i":"MEDCARD","a":"base64","v":"1.0"}"#)
            .expect_err("empty payload");
        assert!(matches!(err, EnvelopeError::EmptyField("e")));
    }

    #[test]
    fn newer_major_or_foreign_scheme_is_unsupported() {
        let newer = Envelope::from_json(r#"{"e":"e30=","i":"MEDCARD","a":"base64","v":"2.1"}"#)
            .expect("envelope");
        assert!(!newer.is_supported());
        let foreign = Envelope::from_json(r#"{"e":"e30=","i":"OTHER","a":"base64","v":"1.0"}"#)
            .expect("envelope");
        assert!(!foreign.is_supported());
        let minor = Envelope::from_json(r#"{"e":"e30=","i":"MEDCARD","a":"base64","v":"1.7"}"#)
            .expect("envelope");
        assert!(minor.is_supported());
    }
}
