//! Test Helper Utilities
//!
//! Stub detection providers and small media fixtures shared by the
//! mg-detect integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use mg_common::config::TomlConfig;
use mg_detect::providers::{DetectionProvider, ProviderError, RegisteredProvider};
use mg_detect::types::{Capability, Finding, Submission};
use mg_detect::DetectionService;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// PNG signature followed by padding
pub const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

/// What a stub does when invoked
#[derive(Clone)]
pub enum Outcome {
    Succeed(Finding),
    Fail(String),
    Timeout,
    Panic,
}

/// Configurable provider that counts its invocations
pub struct StubProvider {
    configured: bool,
    outcome: Outcome,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            configured: true,
            outcome,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(Outcome::Fail("should never run".to_string()))
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Shared invocation counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl DetectionProvider for StubProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn detect(&self, _submission: &Submission) -> Result<Finding, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.outcome {
            Outcome::Succeed(finding) => Ok(finding.clone()),
            Outcome::Fail(message) => Err(ProviderError::Network(message.clone())),
            Outcome::Timeout => Err(ProviderError::Timeout("job still pending".to_string())),
            Outcome::Panic => panic!("stub provider panicked"),
        }
    }
}

pub fn register(id: &str, capability: Capability, stub: StubProvider) -> RegisteredProvider {
    RegisteredProvider::new(id, capability, stub)
}

/// Service over `providers` with default configuration
pub fn service_with(providers: Vec<RegisteredProvider>) -> DetectionService {
    service_with_config(&TomlConfig::default(), providers)
}

pub fn service_with_config(
    config: &TomlConfig,
    providers: Vec<RegisteredProvider>,
) -> DetectionService {
    DetectionService::with_providers(config, providers).expect("valid test configuration")
}

/// Image-analysis finding carrying pre-computed factor strings
pub fn image_finding(confidence: f64, matches: u32, factors: &[&str]) -> Finding {
    Finding::new(confidence, matches).with_metadata("risk_factors", factors.to_vec())
}
