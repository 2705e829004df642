//! Fan-Out Dispatcher
//!
//! Runs every registered provider against one submission concurrently.
//! Each provider's [`safe_invoke`](RegisteredProvider::safe_invoke) runs in
//! its own spawned task; all tasks are launched together and joined together.
//! No task is cancelled early and output order is registration order,
//! whatever order the tasks finish in.

use crate::providers::RegisteredProvider;
use crate::types::{Capability, DetectionReport, Submission};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, warn};

/// Configuration status of one registered provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatusEntry {
    pub provider: String,
    pub capability: Capability,
    pub configured: bool,
}

/// Concurrent provider executor
///
/// # Example
/// ```rust,ignore
/// let dispatcher = FanOutDispatcher::new(default_providers(&credentials), Duration::from_secs(45));
/// let reports = dispatcher.dispatch(Arc::new(submission)).await;
/// assert_eq!(reports.len(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct FanOutDispatcher {
    providers: Vec<RegisteredProvider>,
    provider_timeout: Duration,
}

impl FanOutDispatcher {
    /// Create a dispatcher over `providers` (invocation order = vector order)
    pub fn new(providers: Vec<RegisteredProvider>, provider_timeout: Duration) -> Self {
        Self {
            providers,
            provider_timeout,
        }
    }

    /// Dispatch one submission to every provider
    ///
    /// Returns one report per provider in registration order. A task that
    /// faults at the join point is dropped from the output with a warning.
    pub async fn dispatch(&self, submission: Arc<Submission>) -> Vec<DetectionReport> {
        debug!(
            providers = self.providers.len(),
            filename = %submission.filename,
            content_type = %submission.content_type,
            "Dispatching submission"
        );

        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let provider = provider.clone();
                let submission = Arc::clone(&submission);
                let budget = self.provider_timeout;
                tokio::spawn(async move { provider.safe_invoke(&submission, budget).await })
            })
            .collect();

        collect_reports(join_all(handles).await, &self.providers)
    }

    /// Configuration status per provider
    ///
    /// A provider whose configuration check panics is listed as not configured.
    pub fn provider_status(&self) -> Vec<ProviderStatusEntry> {
        self.providers
            .iter()
            .map(|p| ProviderStatusEntry {
                provider: p.id().to_string(),
                capability: p.capability(),
                configured: p.is_configured(),
            })
            .collect()
    }
}

/// Pair joined task results with their providers, dropping faulted tasks
fn collect_reports(
    joined: Vec<Result<DetectionReport, JoinError>>,
    providers: &[RegisteredProvider],
) -> Vec<DetectionReport> {
    joined
        .into_iter()
        .zip(providers)
        .filter_map(|(joined, provider)| match joined {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(
                    provider = %provider.id(),
                    error = %e,
                    "Provider task faulted, dropping from results"
                );
                None
            }
        })
        .collect()
}
