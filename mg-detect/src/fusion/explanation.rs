//! Explanation Generator
//!
//! Turns successful provider reports into risk factors (what was found) and
//! recommendations (what to do about it). The rules per capability are fixed;
//! the wording comes from an [`ExplanationPolicy`], so one algorithm serves
//! both the `ownership` and the `takedown` profiles.
//!
//! Templates use `{placeholder}` markers filled at generation time.

use crate::types::{evidence, Capability, DetectionReport, RiskTier};
use serde::Serialize;
use serde_json::Value;

/// Profile used when none is configured
pub const DEFAULT_PROFILE: &str = "ownership";

/// Factors and recommendations for one assessment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Wording table for the explanation generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplanationPolicy {
    pub profile: String,
    /// `{name}`, `{confidence}`
    pub celebrity_factor: String,
    /// `{count}`
    pub faces_factor: String,
    /// `{count}`
    pub reverse_search_factor: String,
    /// `{techniques}`
    pub deepfake_factor: String,
    /// `{title}`, `{artist}`
    pub audio_factor: String,
    pub default_factor: String,
    /// Shared by high and critical
    pub elevated_recommendations: Vec<String>,
    pub medium_recommendations: Vec<String>,
    pub low_recommendations: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ExplanationPolicy {
    fn default() -> Self {
        Self::ownership()
    }
}

impl ExplanationPolicy {
    /// Content ownership and likeness framing
    pub fn ownership() -> Self {
        Self {
            profile: "ownership".to_string(),
            celebrity_factor: "Celebrity detected: {name} ({confidence}% confidence)".to_string(),
            faces_factor: "{count} human face(s) detected".to_string(),
            reverse_search_factor: "{count} similar image(s) found online".to_string(),
            deepfake_factor: "Manipulation indicators detected: {techniques}".to_string(),
            audio_factor: "Copyrighted audio detected: {title} by {artist}".to_string(),
            default_factor: "Content analyzed - standard digital media detected".to_string(),
            elevated_recommendations: strings(&[
                "Review content for potential policy violations",
                "Consider implementing additional content safeguards",
                "Monitor for unauthorized usage across platforms",
                "Document analysis results for compliance records",
            ]),
            medium_recommendations: strings(&[
                "Standard monitoring recommended for this content type",
                "Consider watermarking for future content protection",
                "Regular analysis recommended for similar content",
                "Implement basic usage tracking",
            ]),
            low_recommendations: strings(&[
                "Content appears standard - continue normal monitoring",
                "Consider periodic re-analysis for valuable content",
                "Implement preventive digital watermarking",
                "Stay updated on emerging AI detection technologies",
            ]),
        }
    }

    /// Stolen content and DMCA takedown framing
    pub fn takedown() -> Self {
        Self {
            profile: "takedown".to_string(),
            celebrity_factor:
                "Likeness of {name} found ({confidence}% confidence) - verify usage rights"
                    .to_string(),
            faces_factor: "{count} identifiable person(s) appear in this content".to_string(),
            reverse_search_factor: "Found {count} copies of this content online".to_string(),
            deepfake_factor: "Content appears altered ({techniques}) - possible unauthorized derivative"
                .to_string(),
            audio_factor: "Copyrighted audio in use: {title} by {artist}".to_string(),
            default_factor: "No unauthorized copies or derivatives found".to_string(),
            elevated_recommendations: strings(&[
                "File DMCA takedown notices for confirmed infringing copies",
                "Preserve evidence of original ownership and publication dates",
                "Contact hosting platforms to request removal",
                "Consult legal counsel before escalating",
            ]),
            medium_recommendations: strings(&[
                "Monitor identified matches for further unauthorized reuse",
                "Prepare ownership documentation in case a takedown is needed",
                "Add watermarks to future releases",
                "Re-scan periodically to track spread",
            ]),
            low_recommendations: strings(&[
                "No takedown action required at this time",
                "Register the work to simplify future claims",
                "Embed ownership metadata in published copies",
                "Schedule periodic scans for new copies",
            ]),
        }
    }

    /// Look up a built-in profile by name (case-insensitive)
    pub fn from_profile(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ownership" => Some(Self::ownership()),
            "takedown" => Some(Self::takedown()),
            _ => None,
        }
    }

    /// Build factors and recommendations
    ///
    /// Only successful reports with at least one match contribute factors.
    /// The factor list is never empty.
    pub fn generate(&self, reports: &[DetectionReport], tier: RiskTier) -> Explanation {
        let mut risk_factors = Vec::new();

        for report in reports
            .iter()
            .filter(|r| r.is_success() && r.match_count > 0)
        {
            self.factors_for(report, &mut risk_factors);
        }

        if risk_factors.is_empty() {
            risk_factors.push(self.default_factor.clone());
        }

        Explanation {
            risk_factors,
            recommendations: self.recommendations(tier).to_vec(),
        }
    }

    /// Canned recommendation set for a tier
    pub fn recommendations(&self, tier: RiskTier) -> &[String] {
        match tier {
            RiskTier::Critical | RiskTier::High => &self.elevated_recommendations,
            RiskTier::Medium => &self.medium_recommendations,
            RiskTier::Low => &self.low_recommendations,
        }
    }

    fn factors_for(&self, report: &DetectionReport, out: &mut Vec<String>) {
        let metadata = &report.metadata;

        match report.capability {
            Capability::ImageAnalysis => {
                if let Some(Value::Array(items)) = metadata.get(evidence::RISK_FACTORS) {
                    out.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                }
            }
            Capability::FaceDetection => {
                let celebrities = metadata
                    .get(evidence::CELEBRITIES)
                    .and_then(Value::as_array)
                    .filter(|list| !list.is_empty());

                if let Some(celebrities) = celebrities {
                    for celebrity in celebrities {
                        let name = celebrity
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or("Unknown");
                        let confidence = celebrity
                            .get("confidence")
                            .and_then(Value::as_f64)
                            .unwrap_or(0.0);
                        let confidence = format!("{:.1}", confidence);
                        out.push(fill(
                            &self.celebrity_factor,
                            &[("name", name), ("confidence", confidence.as_str())],
                        ));
                    }
                } else {
                    let faces = metadata
                        .get(evidence::TOTAL_FACES)
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    if faces > 0 {
                        let count = faces.to_string();
                        out.push(fill(&self.faces_factor, &[("count", count.as_str())]));
                    }
                }
            }
            Capability::ReverseSearch => {
                out.push(fill(
                    &self.reverse_search_factor,
                    &[("count", report.match_count.to_string().as_str())],
                ));
            }
            Capability::DeepfakeDetection => {
                let techniques: Vec<&str> = metadata
                    .get(evidence::TECHNIQUES)
                    .and_then(Value::as_array)
                    .map(|list| list.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                if !techniques.is_empty() {
                    out.push(fill(
                        &self.deepfake_factor,
                        &[("techniques", techniques.join(", ").as_str())],
                    ));
                }
            }
            Capability::AudioFingerprint => {
                if let Some(music) = metadata.get(evidence::MUSIC_MATCH).filter(|v| v.is_object()) {
                    let title = music.get("title").and_then(Value::as_str).unwrap_or("Unknown");
                    let artist = music
                        .get("artist")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown");
                    out.push(fill(
                        &self.audio_factor,
                        &[("title", title), ("artist", artist)],
                    ));
                }
            }
        }
    }
}

/// Replace `{key}` markers in `template`
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (key, value)| {
            text.replace(&format!("{{{}}}", key), value)
        })
}
