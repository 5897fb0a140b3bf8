//! Capacity budget checks for encoded envelopes.

use medcard_core::EccLevel;
use serde::{Deserialize, Serialize};

/// Hard ceiling on envelope text length, whatever the profile.
pub const MAX_ENVELOPE_CHARS: usize = 2000;

/// Envelope text is longer than the budget. Nothing was truncated.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("encoded envelope is {length} characters, budget is {limit}")]
pub struct SizeExceeded {
    pub length: usize,
    pub limit: usize,
}

/// Errors surfaced to the issuing caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error(transparent)]
    SizeExceeded(#[from] SizeExceeded),
}

/// Where an issued code is going to be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresentationContext {
    /// Printed on a physical card.
    Printed,
    /// Expected to be scanned in poor lighting or from a worn surface.
    PoorLighting,
    /// Screen-to-camera transfer inside the app.
    InApp,
}

impl PresentationContext {
    pub fn ecc_level(self) -> EccLevel {
        match self {
            PresentationContext::Printed => EccLevel::High,
            PresentationContext::PoorLighting => EccLevel::High,
            PresentationContext::InApp => EccLevel::Medium,
        }
    }
}

/// Density / error-correction profile an envelope is rendered with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EccProfile {
    pub level: EccLevel,
}

impl EccProfile {
    pub fn new(level: EccLevel) -> Self {
        Self { level }
    }

    /// Strongest level requested by any of `contexts`.
    ///
    /// When several consumers share one encoding, the budget must hold for
    /// the most demanding of them. An empty slice yields the default profile.
    pub fn for_contexts(contexts: &[PresentationContext]) -> Self {
        contexts
            .iter()
            .map(|c| c.ecc_level())
            .max()
            .map(Self::new)
            .unwrap_or_default()
    }

    /// Character budget for envelope text under this profile.
    pub fn budget(&self) -> usize {
        MAX_ENVELOPE_CHARS.min(self.level.byte_capacity())
    }
}

/// Rejects envelope text that would not fit the chosen profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeGuard {
    max_length: usize,
}

impl Default for SizeGuard {
    fn default() -> Self {
        Self::new(MAX_ENVELOPE_CHARS)
    }
}

impl SizeGuard {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn for_profile(profile: &EccProfile) -> Self {
        Self::new(profile.budget())
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn validate(&self, text: &str) -> Result<(), SizeExceeded> {
        validate(text, self.max_length)
    }

    /// Strongest level weaker than `profile` whose budget would accept
    /// `text`, if any.
    ///
    /// This is advisory only: switching profiles is the caller's decision and
    /// `validate` keeps rejecting under the original profile.
    pub fn suggest_downgrade(&self, text: &str, profile: &EccProfile) -> Option<EccLevel> {
        let length = text.chars().count();
        if length > MAX_ENVELOPE_CHARS {
            return None;
        }
        EccLevel::ALL
            .iter()
            .rev()
            .copied()
            .filter(|&level| level < profile.level)
            .find(|&level| EccProfile::new(level).budget() >= length)
    }
}

/// Check `text` against `max_length` characters.
pub fn validate(text: &str, max_length: usize) -> Result<(), SizeExceeded> {
    let length = text.chars().count();
    if length > max_length {
        return Err(SizeExceeded {
            length,
            limit: max_length,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_inclusive() {
        let at = "x".repeat(MAX_ENVELOPE_CHARS);
        assert!(SizeGuard::default().validate(&at).is_ok());
        let over = "x".repeat(MAX_ENVELOPE_CHARS + 1);
        let err = SizeGuard::default().validate(&over).expect_err("over");
        assert_eq!(err.length, 2001);
        assert_eq!(err.limit, 2000);
    }

    #[test]
    fn profile_uses_strongest_context() {
        let p = EccProfile::for_contexts(&[
            PresentationContext::InApp,
            PresentationContext::PoorLighting,
        ]);
        assert_eq!(p.level, EccLevel::High);
        assert_eq!(p.budget(), 1273);

        let p = EccProfile::for_contexts(&[PresentationContext::InApp]);
        assert_eq!(p.budget(), MAX_ENVELOPE_CHARS);

        assert_eq!(EccProfile::for_contexts(&[]), EccProfile::default());
    }

    #[test]
    fn printed_cards_get_the_high_budget() {
        let p = EccProfile::for_contexts(&[PresentationContext::Printed]);
        assert_eq!(p.level, EccLevel::High);
        assert_eq!(p.budget(), 1273);

        let guard = SizeGuard::for_profile(&p);
        assert!(guard.validate(&"x".repeat(1273)).is_ok());
        let err = guard.validate(&"x".repeat(1373)).expect_err("over");
        assert_eq!((err.length, err.limit), (1373, 1273));
    }

    #[test]
    fn downgrade_is_suggested_but_not_applied() {
        let profile = EccProfile::new(EccLevel::High);
        let guard = SizeGuard::for_profile(&profile);
        let text = "x".repeat(1500);
        assert!(guard.validate(&text).is_err());
        assert_eq!(
            guard.suggest_downgrade(&text, &profile),
            Some(EccLevel::Quartile)
        );

        let too_big = "x".repeat(2500);
        assert_eq!(guard.suggest_downgrade(&too_big, &profile), None);
    }
}
