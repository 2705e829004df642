//! Integrations that are announced but not yet available
//!
//! A `PendingProvider` reports itself as unconfigured, so the safe-invoke
//! boundary emits a `not_configured` report for it and never calls `detect`.

use super::{DetectionProvider, ProviderError};
use crate::types::{Finding, Submission};
use async_trait::async_trait;

/// Placeholder for a provider whose integration has not shipped
#[derive(Debug, Clone)]
pub struct PendingProvider {
    description: String,
}

impl PendingProvider {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

#[async_trait]
impl DetectionProvider for PendingProvider {
    fn is_configured(&self) -> bool {
        false
    }

    async fn detect(&self, _submission: &Submission) -> Result<Finding, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "Coming soon: {}",
            self.description
        )))
    }
}
