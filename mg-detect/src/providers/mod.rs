//! Detection Providers
//!
//! Every detection backend implements [`DetectionProvider`]. Providers are
//! registered together with their identity (provider id and capability) as a
//! [`RegisteredProvider`], whose [`safe_invoke`](RegisteredProvider::safe_invoke)
//! is the single fault-isolation boundary of the engine:
//!
//! - unconfigured providers short-circuit to a `not_configured` report and are
//!   never called
//! - errors, panics and overruns of the outer safety timeout become `error` or
//!   `timeout` reports
//! - elapsed time is stamped on every path that reached the provider
//!
//! A misbehaving provider can therefore never abort a batch or touch another
//! provider's report.
//!
//! # Providers
//! 1. **google_vision** - image forensics (faces, objects, text, safe search)
//! 2. **pending** - integrations that are not available yet (face recognition,
//!    reverse search, deepfake detection, audio fingerprinting)

pub mod google_vision;
pub mod pending;

use crate::types::{Capability, DetectionReport, Finding, Submission};
use async_trait::async_trait;
use futures::FutureExt;
use mg_common::config::ProviderCredentials;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, warn};

pub use google_vision::GoogleVisionProvider;
pub use pending::PendingProvider;

/// Detection backend contract
///
/// # Example
/// ```rust,ignore
/// struct StaticProvider;
///
/// #[async_trait::async_trait]
/// impl DetectionProvider for StaticProvider {
///     fn is_configured(&self) -> bool { true }
///
///     async fn detect(&self, _submission: &Submission) -> Result<Finding, ProviderError> {
///         Ok(Finding::new(80.0, 2))
///     }
/// }
/// ```
#[async_trait]
pub trait DetectionProvider: Send + Sync {
    /// Whether credentials and dependencies are in place
    fn is_configured(&self) -> bool;

    /// Run detection against one submission
    ///
    /// # Errors
    /// Any `ProviderError` is converted into a typed report by `safe_invoke`.
    async fn detect(&self, submission: &Submission) -> Result<Finding, ProviderError>;
}

/// Provider fault
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Provider API returned an error
    #[error("API error: {0}")]
    Api(String),

    /// Failed to parse provider response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Content type not handled by this provider
    #[error("Unsupported content: {0}")]
    Unsupported(String),

    /// Provider gave up waiting (e.g. an asynchronous job did not finish)
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal processing error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Parse(e.to_string())
    }
}

/// A provider bound to its identity
#[derive(Clone)]
pub struct RegisteredProvider {
    id: String,
    capability: Capability,
    provider: Arc<dyn DetectionProvider>,
}

impl std::fmt::Debug for RegisteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredProvider")
            .field("id", &self.id)
            .field("capability", &self.capability)
            .finish()
    }
}

impl RegisteredProvider {
    pub fn new(
        id: impl Into<String>,
        capability: Capability,
        provider: impl DetectionProvider + 'static,
    ) -> Self {
        Self::from_arc(id, capability, Arc::new(provider))
    }

    pub fn from_arc(
        id: impl Into<String>,
        capability: Capability,
        provider: Arc<dyn DetectionProvider>,
    ) -> Self {
        Self {
            id: id.into(),
            capability,
            provider,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Configuration check; a panicking check counts as not configured
    pub fn is_configured(&self) -> bool {
        self.check_configured().unwrap_or(false)
    }

    /// Run the provider's configuration check under the unwind guard
    fn check_configured(&self) -> Result<bool, String> {
        std::panic::catch_unwind(AssertUnwindSafe(|| self.provider.is_configured())).map_err(
            |panic| {
                let message = panic_message(panic.as_ref());
                error!(provider = %self.id, "Configuration check panicked: {}", message);
                message
            },
        )
    }

    /// Invoke the provider behind the fault-isolation boundary
    ///
    /// Always returns a report; never panics or propagates provider faults.
    pub async fn safe_invoke(&self, submission: &Submission, budget: Duration) -> DetectionReport {
        match self.check_configured() {
            Ok(true) => {}
            Ok(false) => {
                debug!(provider = %self.id, "Provider not configured, skipping");
                return DetectionReport::not_configured(&self.id, self.capability);
            }
            Err(message) => {
                return DetectionReport::error(
                    &self.id,
                    self.capability,
                    format!("Provider panicked during configuration check: {}", message),
                );
            }
        }

        let start = Instant::now();
        let outcome = tokio::time::timeout(
            budget,
            AssertUnwindSafe(self.provider.detect(submission)).catch_unwind(),
        )
        .await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let report = match outcome {
            Ok(Ok(Ok(finding))) => {
                debug!(
                    provider = %self.id,
                    capability = %self.capability,
                    confidence = finding.confidence,
                    matches = finding.match_count,
                    elapsed_ms,
                    "Detection succeeded"
                );
                DetectionReport::success(&self.id, self.capability, finding)
            }
            Ok(Ok(Err(ProviderError::Timeout(message)))) => {
                warn!(provider = %self.id, elapsed_ms, "Provider timed out: {}", message);
                DetectionReport::timeout(&self.id, self.capability, message)
            }
            Ok(Ok(Err(e))) => {
                warn!(provider = %self.id, elapsed_ms, error = %e, "Detection failed");
                DetectionReport::error(&self.id, self.capability, e.to_string())
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                error!(provider = %self.id, elapsed_ms, "Provider panicked: {}", message);
                DetectionReport::error(
                    &self.id,
                    self.capability,
                    format!("Provider panicked: {}", message),
                )
            }
            Err(_) => {
                let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
                warn!(provider = %self.id, budget_ms, "Provider exceeded safety timeout");
                DetectionReport::timeout(
                    &self.id,
                    self.capability,
                    format!("{} did not respond within {} ms", self.id, budget_ms),
                )
            }
        };

        report.with_elapsed_ms(elapsed_ms)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Production provider set, in invocation order
pub fn default_providers(credentials: &ProviderCredentials) -> Vec<RegisteredProvider> {
    vec![
        RegisteredProvider::new(
            "Google_Vision",
            Capability::ImageAnalysis,
            GoogleVisionProvider::new(credentials.google_vision_api_key.clone()),
        ),
        RegisteredProvider::new(
            "AWS_Rekognition",
            Capability::FaceDetection,
            PendingProvider::new("Celebrity and face recognition"),
        ),
        RegisteredProvider::new(
            "TinEye_Reverse_Search",
            Capability::ReverseSearch,
            PendingProvider::new("Reverse image search across indexed web images"),
        ),
        RegisteredProvider::new(
            "Sensity_Deepfake_Detection",
            Capability::DeepfakeDetection,
            PendingProvider::new("Deepfake and manipulation detection"),
        ),
        RegisteredProvider::new(
            "ACRCloud_Audio_Fingerprinting",
            Capability::AudioFingerprint,
            PendingProvider::new("Music recognition and audio copyright detection"),
        ),
    ]
}

// ============================================================================
// Mock Provider for Testing
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub enum Behavior {
        Succeed(Finding),
        Fail,
        Panic,
        Hang,
        /// `is_configured` itself panics
        PanicOnConfigCheck,
    }

    /// Mock provider counting `detect` calls
    pub struct MockProvider {
        pub configured: bool,
        pub behavior: Behavior,
        pub calls: Arc<AtomicUsize>,
    }

    impl MockProvider {
        pub fn new(configured: bool, behavior: Behavior) -> Self {
            Self {
                configured,
                behavior,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl DetectionProvider for MockProvider {
        fn is_configured(&self) -> bool {
            if matches!(self.behavior, Behavior::PanicOnConfigCheck) {
                panic!("mock config check panic");
            }
            self.configured
        }

        async fn detect(&self, _submission: &Submission) -> Result<Finding, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed(finding) => Ok(finding.clone()),
                Behavior::Fail | Behavior::PanicOnConfigCheck => {
                    Err(ProviderError::Api("mock failure".to_string()))
                }
                Behavior::Panic => panic!("mock panic"),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Finding::default())
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
