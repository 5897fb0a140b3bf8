//! Interpretation of decoded symbol text and best-effort scan feedback.

use std::io::Write;

use chrono::{DateTime, Utc};
use medcard_core::{DecodedPayload, EmergencyPayload, SymbolDecode, SymbolLocation};
use serde::{Deserialize, Serialize};

use crate::history::{HistoryEntry, HistoryStore};

/// One successful read, as shown to the user and stored in history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub raw_text: String,
    pub payload: DecodedPayload,
    pub captured_at: DateTime<Utc>,
    /// Where the symbol was found in the frame. Overlay only; not persisted.
    #[serde(skip)]
    pub location: Option<SymbolLocation>,
}

impl ScanResult {
    pub fn from_decode(decode: SymbolDecode, captured_at: DateTime<Utc>) -> Self {
        let payload = interpret(&decode.text);
        Self {
            raw_text: decode.text,
            payload,
            captured_at,
            location: decode.location,
        }
    }
}

/// Read arbitrary optical-code text as permissively as possible.
///
/// Envelopes of this scheme and bare JSON objects shaped like a payload come
/// back structured. Anything else, including third-party codes, is raw text.
pub fn interpret(text: &str) -> DecodedPayload {
    if let structured @ DecodedPayload::Structured(_) = medcard_envelope::decode(text) {
        return structured;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(EmergencyPayload::from_json_value)
        .map(DecodedPayload::Structured)
        .unwrap_or_else(|| DecodedPayload::Raw(text.to_owned()))
}

#[derive(thiserror::Error, Debug)]
pub enum FeedbackError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("feedback unavailable: {0}")]
    Unavailable(String),
}

/// Audible (or otherwise sensory) confirmation of a successful scan.
pub trait Feedback {
    fn confirm(&mut self) -> Result<(), FeedbackError>;
}

/// Rings the terminal bell on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalBell;

impl Feedback for TerminalBell {
    fn confirm(&mut self) -> Result<(), FeedbackError> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

/// No feedback.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl Feedback for Silent {
    fn confirm(&mut self) -> Result<(), FeedbackError> {
        Ok(())
    }
}

/// Fire-and-forget: run `f`, log a failure, never propagate it.
pub fn best_effort<E: std::fmt::Display>(what: &str, f: impl FnOnce() -> Result<(), E>) {
    if let Err(err) = f() {
        log::warn!("{what} failed: {err}");
    }
}

/// Turns a decode hit into a [`ScanResult`] and records it.
pub struct ResultHandler {
    history: HistoryStore,
    feedback: Box<dyn Feedback>,
}

impl ResultHandler {
    pub fn new(history: HistoryStore, feedback: Box<dyn Feedback>) -> Self {
        Self { history, feedback }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    /// Interpret `decode`, confirm it, and append it to history.
    ///
    /// Feedback and history failures are logged and swallowed; the returned
    /// result is always usable.
    pub fn handle(
        &mut self,
        decode: SymbolDecode,
        captured_at: DateTime<Utc>,
    ) -> (ScanResult, Option<HistoryEntry>) {
        let result = ScanResult::from_decode(decode, captured_at);
        match &result.payload {
            DecodedPayload::Structured(p) => {
                log::info!("decoded emergency record (id={:?})", p.id.as_deref())
            }
            DecodedPayload::Raw(text) => log::info!("decoded raw text ({} chars)", text.len()),
        }

        let feedback = &mut self.feedback;
        best_effort("scan confirmation", || feedback.confirm());

        let entry = match self.history.record(&result) {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("could not record scan history: {err}");
                None
            }
        };
        (result, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStore;
    use medcard_envelope::encode;

    struct BrokenSpeaker;

    impl Feedback for BrokenSpeaker {
        fn confirm(&mut self) -> Result<(), FeedbackError> {
            Err(FeedbackError::Unavailable("no audio device".into()))
        }
    }

    fn hit(text: &str) -> SymbolDecode {
        SymbolDecode {
            text: text.into(),
            location: None,
        }
    }

    #[test]
    fn envelope_text_is_structured() {
        let p = EmergencyPayload {
            name: Some("Asha K.".into()),
            ..EmergencyPayload::default()
        };
        let text = encode(&p).to_json();
        assert_eq!(interpret(&text), DecodedPayload::Structured(p));
    }

    #[test]
    fn bare_payload_json_is_structured() {
        let decoded = interpret(r#"{"name":"Lee","bloodGroup":"A+"}"#);
        let p = decoded.as_structured().expect("structured");
        assert_eq!(p.blood_group.as_deref(), Some("A+"));
    }

    #[test]
    fn foreign_content_is_raw() {
        for text in ["not json", "https://example.org", r#"{"wifi":"guest"}"#, "42"] {
            assert_eq!(interpret(text), DecodedPayload::Raw(text.into()));
        }
    }

    #[test]
    fn broken_feedback_does_not_block_result() {
        let store = HistoryStore::new(Box::new(MemoryStore::default()));
        let mut handler = ResultHandler::new(store, Box::new(BrokenSpeaker));
        let (result, entry) = handler.handle(hit("not json"), Utc::now());
        assert_eq!(result.payload, DecodedPayload::Raw("not json".into()));
        assert!(entry.is_some());
        assert_eq!(handler.history().load().expect("load").len(), 1);
    }
}
