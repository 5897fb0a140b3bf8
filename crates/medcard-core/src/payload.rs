//! Minimized emergency-data model carried inside an optical code.

use serde::{Deserialize, Serialize};

/// Emergency-relevant subset of a person's record.
///
/// Every field is optional and absent fields are omitted from the wire form
/// entirely (never serialized as `null`), so the encoded symbol stays small.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_conditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContact>,
}

/// Single emergency contact attached to a payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// JSON keys recognized as belonging to [`EmergencyPayload`].
const PAYLOAD_KEYS: [&str; 7] = [
    "id",
    "name",
    "bloodGroup",
    "allergies",
    "medications",
    "criticalConditions",
    "emergencyContact",
];

impl EmergencyPayload {
    /// True if no field is present.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Interpret an already-parsed JSON value as a payload.
    ///
    /// Returns `None` unless `value` is an object carrying at least one
    /// recognized key and every recognized key has the expected shape.
    /// Unknown keys are ignored.
    pub fn from_json_value(value: serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        if !PAYLOAD_KEYS.iter().any(|k| object.contains_key(*k)) {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

/// Decoded optical-code content: either this system's payload or raw text.
///
/// Consumers must branch on the variant; nothing about the shape of a `Raw`
/// value is assumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DecodedPayload {
    Structured(EmergencyPayload),
    Raw(String),
}

impl DecodedPayload {
    pub fn as_structured(&self) -> Option<&EmergencyPayload> {
        match self {
            DecodedPayload::Structured(p) => Some(p),
            DecodedPayload::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            DecodedPayload::Structured(_) => None,
            DecodedPayload::Raw(text) => Some(text),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, DecodedPayload::Structured(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_fields_are_omitted_not_null() {
        let p = EmergencyPayload {
            name: Some("Asha K.".into()),
            blood_group: Some("O-".into()),
            id: Some("abc123".into()),
            ..EmergencyPayload::default()
        };
        let text = serde_json::to_string(&p).expect("serialize");
        assert!(!text.contains("null"));
        assert!(!text.contains("allergies"));
        assert!(text.contains("\"bloodGroup\":\"O-\""));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let value = json!({ "name": "R. Diaz", "insurer": "n/a" });
        let p = EmergencyPayload::from_json_value(value).expect("payload");
        assert_eq!(p.name.as_deref(), Some("R. Diaz"));
    }

    #[test]
    fn object_without_known_keys_is_not_a_payload() {
        assert!(EmergencyPayload::from_json_value(json!({ "url": "x" })).is_none());
        assert!(EmergencyPayload::from_json_value(json!([1, 2])).is_none());
        assert!(EmergencyPayload::from_json_value(json!({ "allergies": 3 })).is_none());
    }

    #[test]
    fn decoded_payload_is_tagged() {
        let raw = DecodedPayload::Raw("hello".into());
        let text = serde_json::to_string(&raw).expect("serialize");
        assert_eq!(text, r#"{"kind":"raw","value":"hello"}"#);
        let back: DecodedPayload = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back.as_raw(), Some("hello"));
    }
}
