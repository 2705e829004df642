//! Risk Fusion
//!
//! Reduces N provider reports to one overall tier and confidence.
//!
//! Only successful reports take part. Each one is weighted:
//! - base weight 1.0
//! - +0.5 when the provider found matches
//! - +0.3 when its confidence is above 80
//!
//! Overall confidence is the weighted mean, clamped to [0, 100]. The overall
//! tier is the highest tier among successful reports; a single severe signal
//! is never averaged away.

pub mod explanation;

pub use explanation::ExplanationPolicy;

use crate::types::{DetectionReport, RiskTier};
use tracing::debug;

/// Weight every successful report starts with
pub const BASE_WEIGHT: f64 = 1.0;

/// Bonus for reports with at least one match
pub const MATCH_BONUS: f64 = 0.5;

/// Bonus for reports whose confidence exceeds [`HIGH_CONFIDENCE_THRESHOLD`]
pub const HIGH_CONFIDENCE_BONUS: f64 = 0.3;

/// Confidence above which [`HIGH_CONFIDENCE_BONUS`] applies (exclusive)
pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 80.0;

/// Weight of one successful report
pub fn report_weight(report: &DetectionReport) -> f64 {
    let mut weight = BASE_WEIGHT;
    if report.match_count > 0 {
        weight += MATCH_BONUS;
    }
    if report.confidence > HIGH_CONFIDENCE_THRESHOLD {
        weight += HIGH_CONFIDENCE_BONUS;
    }
    weight
}

/// Fuse reports into (overall tier, overall confidence)
///
/// Returns `(RiskTier::Low, 0.0)` when no report succeeded.
pub fn fuse(reports: &[DetectionReport]) -> (RiskTier, f64) {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut tier = RiskTier::Low;
    let mut successes = 0usize;

    for report in reports
        .iter()
        .filter(|r| r.is_success() && r.confidence.is_finite())
    {
        let weight = report_weight(report);
        weighted_sum += report.confidence * weight;
        total_weight += weight;
        tier = tier.max(report.risk_tier);
        successes += 1;
    }

    let confidence = if total_weight > 0.0 {
        (weighted_sum / total_weight).clamp(0.0, 100.0)
    } else {
        0.0
    };

    debug!(
        reports = reports.len(),
        successes,
        tier = %tier,
        confidence,
        "Fused provider reports"
    );

    (tier, confidence)
}

/// Sum of matches over successful reports
pub fn total_matches(reports: &[DetectionReport]) -> u64 {
    reports
        .iter()
        .filter(|r| r.is_success() && r.match_count > 0)
        .map(|r| u64::from(r.match_count))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Capability, Finding};

    fn success(confidence: f64, matches: u32, tier: RiskTier) -> DetectionReport {
        DetectionReport::success(
            "P",
            Capability::ImageAnalysis,
            Finding::new(confidence, matches).with_tier(tier),
        )
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_no_success_is_low_zero() {
        let reports = vec![
            DetectionReport::not_configured("A", Capability::FaceDetection),
            DetectionReport::error("B", Capability::ReverseSearch, "down"),
            DetectionReport::timeout("C", Capability::DeepfakeDetection, "slow"),
        ];
        assert_eq!(fuse(&reports), (RiskTier::Low, 0.0));
        assert_eq!(fuse(&[]), (RiskTier::Low, 0.0));
    }

    #[test]
    fn test_single_high_confidence_without_matches() {
        let report = success(90.0, 0, RiskTier::Medium);
        assert_close(report_weight(&report), 1.3);

        let (tier, confidence) = fuse(&[report]);
        assert_eq!(tier, RiskTier::Medium);
        assert_close(confidence, 90.0);
    }

    #[test]
    fn test_weights_combine() {
        assert_close(report_weight(&success(95.0, 6, RiskTier::Critical)), 1.8);
        assert_close(report_weight(&success(80.0, 2, RiskTier::Medium)), 1.5);
        assert_close(report_weight(&success(10.0, 0, RiskTier::Low)), 1.0);
    }

    #[test]
    fn test_weighted_mean() {
        // (90 * 1.8 + 30 * 1.0) / 2.8
        let reports = vec![
            success(90.0, 4, RiskTier::High),
            success(30.0, 0, RiskTier::Low),
        ];
        let (tier, confidence) = fuse(&reports);
        assert_eq!(tier, RiskTier::High);
        assert_close(confidence, 192.0 / 2.8);
    }

    #[test]
    fn test_worst_tier_wins_and_failures_ignored() {
        let reports = vec![
            success(20.0, 0, RiskTier::Low),
            success(40.0, 1, RiskTier::Critical),
            success(50.0, 0, RiskTier::Medium),
            DetectionReport::error("E", Capability::ReverseSearch, "x"),
        ];
        let (tier, _) = fuse(&reports);
        assert_eq!(tier, RiskTier::Critical);

        for report in reports.iter().filter(|r| r.is_success()) {
            assert!(tier >= report.risk_tier);
        }
    }

    #[test]
    fn test_nan_confidence_never_reaches_the_overall_score() {
        let nan = DetectionReport::success(
            "N",
            Capability::ReverseSearch,
            Finding {
                confidence: f64::NAN,
                risk_tier: RiskTier::High,
                match_count: 1,
                ..Finding::default()
            },
        );
        assert!(!nan.is_success());

        let (tier, confidence) = fuse(&[nan.clone(), success(40.0, 0, RiskTier::Low)]);
        assert_eq!(tier, RiskTier::Low);
        assert_close(confidence, 40.0);

        // a report built by hand still cannot poison the mean
        let mut forged = success(60.0, 1, RiskTier::Medium);
        forged.confidence = f64::NAN;
        let (tier, confidence) = fuse(&[forged]);
        assert_eq!(tier, RiskTier::Low);
        assert!((0.0..=100.0).contains(&confidence));
    }

    #[test]
    fn test_total_matches_counts_successes_only() {
        let reports = vec![
            success(95.0, 6, RiskTier::Critical),
            success(50.0, 0, RiskTier::Low),
            DetectionReport::error("E", Capability::ReverseSearch, "x"),
        ];
        assert_eq!(total_matches(&reports), 6);
    }
}
