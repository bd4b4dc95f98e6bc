// Shared Types and Data Contracts
//
// Explicit contracts between the classification stages:
// matchers/resolvers produce ClassificationSignal values, the fusion engine
// consumes them and produces exactly one FusionResult per request.

use serde::{Deserialize, Serialize};

// ============================================================================
// Input
// ============================================================================

/// Free-text signals declared for a newly registered facility
///
/// Every field is optional; an entirely empty draft still yields a valid
/// (maximally uncertain) identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacilityDraft {
    pub name: Option<String>,
    pub industry_text: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl FacilityDraft {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_industry_text(mut self, text: impl Into<String>) -> Self {
        self.industry_text = Some(text.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

// ============================================================================
// Signals (matcher/resolver output)
// ============================================================================

/// Field a signal was derived from (for provenance tracking)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalSource {
    Name,
    IndustryText,
    Address,
    Phone,
    EmailDomain,
}

/// Classification axis a signal votes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalAxis {
    Industry,
    Region,
}

/// One evaluated classification candidate
///
/// Recorded whether or not it won, so the fusion result carries a full
/// audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSignal {
    pub source_kind: SignalSource,
    pub axis: SignalAxis,
    pub raw_text: String,
    pub matched_keywords: Vec<String>,
    pub code: String,
    pub confidence: f64, // [0.0, 1.0]
    /// Passed its acceptance rule and took part in the best-confidence pick
    pub accepted: bool,
    /// Human-readable justification
    pub reasoning: String,
}

// ============================================================================
// Fusion output
// ============================================================================

/// Weight of the industry axis in the overall confidence
pub const INDUSTRY_WEIGHT: f64 = 0.6;
/// Weight of the region axis in the overall confidence
pub const REGION_WEIGHT: f64 = 0.4;

/// Fused classification decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    pub industry_code: String,
    pub region_code: String,
    pub industry_confidence: f64,
    pub region_confidence: f64,
    pub overall_confidence: f64,
    pub signals_used: Vec<ClassificationSignal>,
    /// Route to manual review; never blocks generation
    pub needs_confirmation: bool,
}

impl FusionResult {
    /// Industry signals are denser than region signals and weigh more
    pub fn overall_confidence(industry_confidence: f64, region_confidence: f64) -> f64 {
        INDUSTRY_WEIGHT * industry_confidence + REGION_WEIGHT * region_confidence
    }

    /// Signals that voted on one axis
    pub fn signals_for(&self, axis: SignalAxis) -> impl Iterator<Item = &ClassificationSignal> {
        self.signals_used.iter().filter(move |s| s.axis == axis)
    }

    /// The signal that decided the region, if any candidate qualified
    pub fn winning_region_signal(&self) -> Option<&ClassificationSignal> {
        self.signals_for(SignalAxis::Region).find(|s| {
            s.accepted && s.code == self.region_code && s.confidence == self.region_confidence
        })
    }
}
