//! Google Vision Provider (image_analysis)
//!
//! Sends the image to the Vision `images:annotate` endpoint and grades what
//! comes back: faces, localized objects, text and safe-search likelihoods.
//!
//! # Scoring
//! - faces present → +30 confidence, every face counts as a match
//! - objects present → +20
//! - text present → +20
//! - adult content LIKELY/VERY_LIKELY → +40
//! - violence LIKELY/VERY_LIKELY → +30
//!
//! Confidence is capped at 100 and the tier comes from
//! [`RiskTier::from_evidence`](crate::types::RiskTier::from_evidence).
//!
//! # API Reference
//! - Endpoint: https://vision.googleapis.com/v1/images:annotate

use super::{DetectionProvider, ProviderError};
use crate::types::{evidence, Finding, Submission};
use async_trait::async_trait;
use base64::Engine;
use mg_common::config::is_valid_key;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Vision API endpoint
const VISION_API_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Default timeout for Vision API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Value shipped in sample configs; treated as "no key"
const PLACEHOLDER_KEY: &str = "paste_your_google_api_key_here";

const LIKELY: [&str; 2] = ["LIKELY", "VERY_LIKELY"];

/// Google Vision image forensics provider
pub struct GoogleVisionProvider {
    http_client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl GoogleVisionProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_key,
            endpoint: VISION_API_URL.to_string(),
        }
    }

    /// Point the provider at a different endpoint (proxies, test servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn usable_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| is_valid_key(key) && *key != PLACEHOLDER_KEY)
    }
}

#[async_trait]
impl DetectionProvider for GoogleVisionProvider {
    fn is_configured(&self) -> bool {
        self.usable_key().is_some()
    }

    async fn detect(&self, submission: &Submission) -> Result<Finding, ProviderError> {
        if !submission.is_image() {
            return Err(ProviderError::Unsupported(
                "Google Vision only supports image files".to_string(),
            ));
        }

        let api_key = self
            .usable_key()
            .ok_or_else(|| ProviderError::Internal("API key missing".to_string()))?;

        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&submission.content);
        let request_body = json!({
            "requests": [{
                "image": { "content": image_base64 },
                "features": [
                    { "type": "FACE_DETECTION", "maxResults": 10 },
                    { "type": "OBJECT_LOCALIZATION", "maxResults": 10 },
                    { "type": "TEXT_DETECTION", "maxResults": 5 },
                    { "type": "SAFE_SEARCH_DETECTION" },
                    { "type": "IMAGE_PROPERTIES" }
                ]
            }]
        });

        debug!(
            bytes = submission.content.len(),
            filename = %submission.filename,
            "Querying Google Vision"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "Google Vision API error: {}",
                response.status()
            )));
        }

        let body: AnnotateResponse = response.json().await?;

        if let Some(error) = body.error {
            return Err(ProviderError::Api(format!(
                "Google Vision error: {}",
                error.message
            )));
        }

        let annotations = body
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("Empty Google Vision response".to_string()))?;

        if let Some(error) = &annotations.error {
            return Err(ProviderError::Api(format!(
                "Google Vision error: {}",
                error.message
            )));
        }

        Ok(interpret_annotations(&annotations))
    }
}

// ============================================================================
// Response model
// ============================================================================

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageAnnotations>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

/// Annotations for one image
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnnotations {
    #[serde(default)]
    face_annotations: Vec<FaceAnnotation>,
    #[serde(default)]
    localized_object_annotations: Vec<ObjectAnnotation>,
    #[serde(default)]
    text_annotations: Vec<Value>,
    #[serde(default)]
    safe_search_annotation: serde_json::Map<String, Value>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceAnnotation {
    joy_likelihood: Option<String>,
    anger_likelihood: Option<String>,
    surprise_likelihood: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectAnnotation {
    name: String,
}

fn is_likely(safe_search: &serde_json::Map<String, Value>, category: &str) -> bool {
    safe_search
        .get(category)
        .and_then(Value::as_str)
        .is_some_and(|likelihood| LIKELY.contains(&likelihood))
}

/// Grade one image's annotations
pub fn interpret_annotations(annotations: &ImageAnnotations) -> Finding {
    let face_count = annotations.face_annotations.len();
    let object_count = annotations.localized_object_annotations.len();
    let text_found = !annotations.text_annotations.is_empty();
    let safe_search = &annotations.safe_search_annotation;

    let mut confidence = 0.0;
    let mut matches: u32 = 0;
    let mut risk_factors: Vec<String> = Vec::new();

    if face_count > 0 {
        confidence += 30.0;
        matches += u32::try_from(face_count).unwrap_or(u32::MAX);
        risk_factors.push(format!("{} human face(s) detected", face_count));
    }

    let object_names: Vec<&str> = annotations
        .localized_object_annotations
        .iter()
        .map(|o| o.name.as_str())
        .collect();

    if object_count > 0 {
        confidence += 20.0;
        let top: Vec<&str> = object_names.iter().take(3).copied().collect();
        risk_factors.push(format!("Objects detected: {}", top.join(", ")));
    }

    if text_found {
        confidence += 20.0;
        risk_factors.push("Text content detected in image".to_string());
    }

    if is_likely(safe_search, "adult") {
        confidence += 40.0;
        risk_factors.push("Potentially sensitive content detected".to_string());
    }

    if is_likely(safe_search, "violence") {
        confidence += 30.0;
        risk_factors.push("Violent content detected".to_string());
    }

    let face_emotions: Vec<Value> = annotations
        .face_annotations
        .iter()
        .take(3)
        .map(|face| {
            json!({
                "joy": face.joy_likelihood.as_deref().unwrap_or("UNKNOWN"),
                "anger": face.anger_likelihood.as_deref().unwrap_or("UNKNOWN"),
                "surprise": face.surprise_likelihood.as_deref().unwrap_or("UNKNOWN"),
            })
        })
        .collect();

    Finding::new(f64::min(confidence, 100.0), matches)
        .with_metadata("faces_detected", face_count)
        .with_metadata("objects_detected", object_count)
        .with_metadata("text_detected", text_found)
        .with_metadata(
            "top_objects",
            object_names.iter().take(5).map(|s| s.to_string()).collect::<Vec<_>>(),
        )
        .with_metadata("face_emotions", face_emotions)
        .with_metadata("safe_search", Value::Object(safe_search.clone()))
        .with_metadata(evidence::RISK_FACTORS, risk_factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Capability, DetectionReport, ProviderStatus, RiskTier};
    use crate::providers::RegisteredProvider;
    use axum::{http::{header, StatusCode}, routing::post, Router};

    fn parse(value: Value) -> ImageAnnotations {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_configuration_check() {
        assert!(!GoogleVisionProvider::new(None).is_configured());
        assert!(!GoogleVisionProvider::new(Some("   ".to_string())).is_configured());
        assert!(!GoogleVisionProvider::new(Some(PLACEHOLDER_KEY.to_string())).is_configured());
        assert!(GoogleVisionProvider::new(Some("real-key".to_string())).is_configured());
    }

    #[tokio::test]
    async fn test_rejects_non_image_content() {
        let provider = GoogleVisionProvider::new(Some("key".to_string()));
        let submission = Submission::new(vec![0u8; 16], "audio/mpeg", "song.mp3");

        let err = provider.detect(&submission).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }

    #[test]
    fn test_empty_annotations_score_zero() {
        let finding = interpret_annotations(&parse(json!({})));
        assert_eq!(finding.confidence, 0.0);
        assert_eq!(finding.match_count, 0);
        assert_eq!(finding.risk_tier, RiskTier::Low);
        assert_eq!(finding.metadata[evidence::RISK_FACTORS], json!([]));
    }

    #[test]
    fn test_faces_objects_and_text() {
        let annotations = parse(json!({
            "faceAnnotations": [
                { "joyLikelihood": "VERY_LIKELY" },
                { "angerLikelihood": "UNLIKELY" }
            ],
            "localizedObjectAnnotations": [
                { "name": "Person" }, { "name": "Hat" }, { "name": "Car" }, { "name": "Tree" }
            ],
            "textAnnotations": [ { "description": "hello" } ],
            "safeSearchAnnotation": { "adult": "UNLIKELY", "violence": "VERY_UNLIKELY" }
        }));

        let finding = interpret_annotations(&annotations);

        assert_eq!(finding.confidence, 70.0);
        assert_eq!(finding.match_count, 2);
        assert_eq!(finding.risk_tier, RiskTier::Medium);
        assert_eq!(
            finding.metadata[evidence::RISK_FACTORS],
            json!([
                "2 human face(s) detected",
                "Objects detected: Person, Hat, Car",
                "Text content detected in image"
            ])
        );
        assert_eq!(finding.metadata["face_emotions"][0]["joy"], "VERY_LIKELY");
        assert_eq!(finding.metadata["face_emotions"][1]["joy"], "UNKNOWN");
        assert_eq!(finding.metadata["top_objects"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_confidence_is_capped() {
        let annotations = parse(json!({
            "faceAnnotations": [{}, {}, {}, {}, {}],
            "localizedObjectAnnotations": [ { "name": "Person" } ],
            "textAnnotations": [ {} ],
            "safeSearchAnnotation": { "adult": "LIKELY", "violence": "VERY_LIKELY" }
        }));

        let finding = interpret_annotations(&annotations);

        assert_eq!(finding.confidence, 100.0);
        assert_eq!(finding.match_count, 5);
        assert_eq!(finding.risk_tier, RiskTier::Critical);
    }

    /// Serve one canned Vision response on an ephemeral local port
    async fn vision_stub(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route(
            "/annotate",
            post(move || async move {
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/annotate", addr)
    }

    async fn invoke_against(status: StatusCode, body: &'static str) -> DetectionReport {
        let endpoint = vision_stub(status, body).await;
        let provider = RegisteredProvider::new(
            "Google_Vision",
            Capability::ImageAnalysis,
            GoogleVisionProvider::new(Some("test-key".to_string())).with_endpoint(endpoint),
        );
        let submission = Submission::new(vec![0x89, b'P', b'N', b'G'], "image/png", "a.png");
        provider
            .safe_invoke(&submission, Duration::from_secs(10))
            .await
    }

    fn error_message(report: &DetectionReport) -> &str {
        report.error_message.as_deref().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_detect_scores_live_response() {
        let report = invoke_against(
            StatusCode::OK,
            r#"{"responses":[{"faceAnnotations":[{"joyLikelihood":"LIKELY"}],"textAnnotations":[{"description":"hi"}]}]}"#,
        )
        .await;

        assert_eq!(report.status, ProviderStatus::Success);
        assert_eq!(report.confidence, 50.0);
        assert_eq!(report.match_count, 1);
        assert_eq!(report.metadata["faces_detected"], 1);
    }

    #[tokio::test]
    async fn test_http_failure_is_api_error() {
        let report = invoke_against(StatusCode::FORBIDDEN, r#"{"error":{"message":"denied"}}"#).await;

        assert_eq!(report.status, ProviderStatus::Error);
        assert!(error_message(&report).starts_with("API error"));
        assert!(error_message(&report).contains("403"));
    }

    #[tokio::test]
    async fn test_error_bodies_are_api_errors() {
        let report = invoke_against(
            StatusCode::OK,
            r#"{"error":{"message":"API key not valid"}}"#,
        )
        .await;
        assert_eq!(report.status, ProviderStatus::Error);
        assert!(error_message(&report).contains("API key not valid"));

        let report = invoke_against(
            StatusCode::OK,
            r#"{"responses":[{"error":{"message":"Bad image data"}}]}"#,
        )
        .await;
        assert_eq!(report.status, ProviderStatus::Error);
        assert!(error_message(&report).starts_with("API error"));
        assert!(error_message(&report).contains("Bad image data"));
    }

    #[tokio::test]
    async fn test_unusable_bodies_are_parse_errors() {
        let report = invoke_against(StatusCode::OK, r#"{"responses":[]}"#).await;
        assert_eq!(report.status, ProviderStatus::Error);
        assert!(error_message(&report).starts_with("Parse error"));

        let report = invoke_against(StatusCode::OK, "not json at all").await;
        assert_eq!(report.status, ProviderStatus::Error);
        assert!(error_message(&report).starts_with("Parse error"));
    }
}
