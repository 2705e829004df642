//! Core Types for MediaGuard detection
//!
//! Defines the data model shared by every stage of the aggregation engine:
//! - **DetectionReport:** one provider's outcome for one submission
//! - **UnifiedAssessment:** the fused result for one submission
//! - **Submission:** the immutable payload handed to every provider

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Provider-specific evidence map
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata keys shared between providers and the explanation generator
pub mod evidence {
    /// image_analysis: pre-computed factor strings (array of strings)
    pub const RISK_FACTORS: &str = "risk_factors";
    /// face_detection: recognised identities (array of `{name, confidence}`)
    pub const CELEBRITIES: &str = "celebrities";
    /// face_detection: number of faces found (integer)
    pub const TOTAL_FACES: &str = "total_faces";
    /// deepfake_detection: manipulation techniques (array of strings)
    pub const TECHNIQUES: &str = "techniques";
    /// audio_fingerprint: best music match (`{title, artist, album, score}`)
    pub const MUSIC_MATCH: &str = "music_match";
}

// ============================================================================
// Enumerations
// ============================================================================

/// Detection capability a provider performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ImageAnalysis,
    FaceDetection,
    ReverseSearch,
    DeepfakeDetection,
    AudioFingerprint,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ImageAnalysis => "image_analysis",
            Capability::FaceDetection => "face_detection",
            Capability::ReverseSearch => "reverse_search",
            Capability::DeepfakeDetection => "deepfake_detection",
            Capability::AudioFingerprint => "audio_fingerprint",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome status of one provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Success,
    Error,
    Timeout,
    NotConfigured,
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderStatus::Success => "success",
            ProviderStatus::Error => "error",
            ProviderStatus::Timeout => "timeout",
            ProviderStatus::NotConfigured => "not_configured",
        };
        f.write_str(s)
    }
}

/// Risk tier, ordered low < medium < high < critical
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskTier {
    /// Per-provider tier heuristic from confidence (0-100) and match count
    ///
    /// Providers that grade their own evidence use this; cross-provider fusion
    /// does not.
    pub fn from_evidence(confidence: f64, matches: u32) -> Self {
        if matches == 0 {
            RiskTier::Low
        } else if confidence >= 90.0 && matches >= 5 {
            RiskTier::Critical
        } else if confidence >= 75.0 && matches >= 3 {
            RiskTier::High
        } else if confidence >= 50.0 || matches >= 1 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Submission
// ============================================================================

/// Immutable payload shared by every provider task of one request
#[derive(Debug, Clone)]
pub struct Submission {
    /// Raw file bytes (never mutated)
    pub content: Arc<[u8]>,
    /// Content type sniffed from magic bytes
    pub content_type: String,
    /// Sanitised filename
    pub filename: String,
}

impl Submission {
    pub fn new(
        content: impl Into<Arc<[u8]>>,
        content_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
            filename: filename.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

// ============================================================================
// Provider outcomes
// ============================================================================

/// Successful detection output returned by a provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Finding {
    /// Confidence (0-100)
    pub confidence: f64,
    /// Provider-graded tier
    pub risk_tier: RiskTier,
    /// Number of matches found
    pub match_count: u32,
    /// Evidence for the explanation generator
    pub metadata: Metadata,
}

impl Finding {
    /// Create a finding graded with [`RiskTier::from_evidence`]
    pub fn new(confidence: f64, match_count: u32) -> Self {
        let confidence = confidence.clamp(0.0, 100.0);
        Self {
            confidence,
            risk_tier: RiskTier::from_evidence(confidence, match_count),
            match_count,
            metadata: Metadata::new(),
        }
    }

    /// Override the graded tier
    pub fn with_tier(mut self, tier: RiskTier) -> Self {
        self.risk_tier = tier;
        self
    }

    /// Attach one metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One provider's outcome for one submission
///
/// Non-success reports can only be built through the failure constructors, which
/// zero confidence and match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub provider: String,
    pub capability: Capability,
    pub status: ProviderStatus,
    pub confidence: f64,
    pub risk_tier: RiskTier,
    pub match_count: u32,
    pub elapsed_ms: u64,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DetectionReport {
    /// Successful report carrying the provider's finding
    ///
    /// A finding whose confidence is NaN or infinite becomes an `error` report.
    pub fn success(provider: impl Into<String>, capability: Capability, finding: Finding) -> Self {
        if !finding.confidence.is_finite() {
            return Self::error(
                provider,
                capability,
                format!("Provider returned non-finite confidence ({})", finding.confidence),
            );
        }

        Self {
            provider: provider.into(),
            capability,
            status: ProviderStatus::Success,
            confidence: finding.confidence.clamp(0.0, 100.0),
            risk_tier: finding.risk_tier,
            match_count: finding.match_count,
            elapsed_ms: 0,
            metadata: finding.metadata,
            error_message: None,
        }
    }

    pub fn not_configured(provider: impl Into<String>, capability: Capability) -> Self {
        let provider = provider.into();
        let message = format!("{} is not configured", provider);
        Self::failure(provider, capability, ProviderStatus::NotConfigured, message)
    }

    pub fn error(
        provider: impl Into<String>,
        capability: Capability,
        message: impl Into<String>,
    ) -> Self {
        Self::failure(provider.into(), capability, ProviderStatus::Error, message.into())
    }

    pub fn timeout(
        provider: impl Into<String>,
        capability: Capability,
        message: impl Into<String>,
    ) -> Self {
        Self::failure(provider.into(), capability, ProviderStatus::Timeout, message.into())
    }

    fn failure(
        provider: String,
        capability: Capability,
        status: ProviderStatus,
        message: String,
    ) -> Self {
        Self {
            provider,
            capability,
            status,
            confidence: 0.0,
            risk_tier: RiskTier::Low,
            match_count: 0,
            elapsed_ms: 0,
            metadata: Metadata::new(),
            error_message: Some(message),
        }
    }

    /// Stamp elapsed wall time
    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ProviderStatus::Success
    }
}

// ============================================================================
// Assessment
// ============================================================================

/// Final, immutable result for one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAssessment {
    pub id: Uuid,
    pub original_filename: String,
    /// SHA-256 of the raw bytes, lower-case hex
    pub content_hash: String,
    pub content_type: String,
    pub file_size: u64,
    pub overall_risk_tier: RiskTier,
    pub overall_confidence: f64,
    pub total_matches: u64,
    pub total_elapsed_ms: u64,
    /// One report per invoked provider, in registration order
    pub reports: Vec<DetectionReport>,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UnifiedAssessment {
    /// First report produced for `capability`
    pub fn report_for(&self, capability: Capability) -> Option<&DetectionReport> {
        self.reports.iter().find(|r| r.capability == capability)
    }

}

/// Listing entry for recent assessments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub risk_tier: RiskTier,
    pub confidence: f64,
    pub total_matches: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&UnifiedAssessment> for AssessmentSummary {
    fn from(assessment: &UnifiedAssessment) -> Self {
        Self {
            id: assessment.id,
            filename: assessment.original_filename.clone(),
            content_type: assessment.content_type.clone(),
            risk_tier: assessment.overall_risk_tier,
            confidence: assessment.overall_confidence,
            total_matches: assessment.total_matches,
            created_at: assessment.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_tier_ordering() {
        assert!(RiskTier::Low < RiskTier::Medium);
        assert!(RiskTier::Medium < RiskTier::High);
        assert!(RiskTier::High < RiskTier::Critical);
    }

    #[test]
    fn test_from_evidence_thresholds() {
        assert_eq!(RiskTier::from_evidence(99.0, 0), RiskTier::Low);
        assert_eq!(RiskTier::from_evidence(90.0, 5), RiskTier::Critical);
        assert_eq!(RiskTier::from_evidence(89.9, 5), RiskTier::High);
        assert_eq!(RiskTier::from_evidence(75.0, 3), RiskTier::High);
        assert_eq!(RiskTier::from_evidence(74.0, 3), RiskTier::Medium);
        assert_eq!(RiskTier::from_evidence(10.0, 1), RiskTier::Medium);
    }

    #[test]
    fn test_failure_reports_zero_scores() {
        let report = DetectionReport::error("P", Capability::ReverseSearch, "boom");
        assert_eq!(report.status, ProviderStatus::Error);
        assert_eq!(report.confidence, 0.0);
        assert_eq!(report.match_count, 0);
        assert_eq!(report.error_message.as_deref(), Some("boom"));

        let report = DetectionReport::not_configured("TinEye", Capability::ReverseSearch);
        assert_eq!(report.status, ProviderStatus::NotConfigured);
        assert_eq!(
            report.error_message.as_deref(),
            Some("TinEye is not configured")
        );
    }

    #[test]
    fn test_serde_names_are_snake_case() {
        let report = DetectionReport::timeout("P", Capability::DeepfakeDetection, "slow");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["capability"], "deepfake_detection");
        assert_eq!(json["status"], "timeout");
        assert_eq!(json["risk_tier"], "low");
    }

    #[test]
    fn test_non_finite_confidence_is_an_error_report() {
        for confidence in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let finding = Finding {
                confidence,
                risk_tier: RiskTier::Critical,
                match_count: 4,
                metadata: Metadata::new(),
            };
            let report = DetectionReport::success("P", Capability::ImageAnalysis, finding);

            assert_eq!(report.status, ProviderStatus::Error);
            assert_eq!(report.confidence, 0.0);
            assert_eq!(report.match_count, 0);
            assert_eq!(report.risk_tier, RiskTier::Low);
        }
    }

    #[test]
    fn test_finding_clamps_confidence() {
        let finding = Finding::new(140.0, 2);
        assert_eq!(finding.confidence, 100.0);
        assert_eq!(finding.risk_tier, RiskTier::Medium);
    }
}
