//! Detection Service
//!
//! Wires the aggregation engine together: intake checks, fan-out dispatch,
//! risk fusion, explanation and storage. One `DetectionService` is built at
//! startup and shared by every request handler.

use crate::dispatcher::{FanOutDispatcher, ProviderStatusEntry};
use crate::fusion::{self, ExplanationPolicy};
use crate::intake::{content_hash, IntakeError, IntakeValidator, SlidingWindowLimiter};
use crate::providers::{default_providers, RegisteredProvider};
use crate::store::{InMemoryResultStore, ResultStore};
use crate::types::{AssessmentSummary, Submission, UnifiedAssessment};
use chrono::Utc;
use mg_common::config::TomlConfig;
use mg_common::Error;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Aggregation engine entry point
pub struct DetectionService {
    dispatcher: FanOutDispatcher,
    policy: ExplanationPolicy,
    store: Arc<dyn ResultStore>,
    validator: IntakeValidator,
    limiter: SlidingWindowLimiter,
}

impl DetectionService {
    pub fn new(
        dispatcher: FanOutDispatcher,
        policy: ExplanationPolicy,
        store: Arc<dyn ResultStore>,
        validator: IntakeValidator,
        limiter: SlidingWindowLimiter,
    ) -> Self {
        Self {
            dispatcher,
            policy,
            store,
            validator,
            limiter,
        }
    }

    /// Production service: default providers and an in-memory store
    pub fn from_config(config: &TomlConfig) -> mg_common::Result<Self> {
        Self::with_providers(config, default_providers(&config.providers))
    }

    /// Service over an explicit provider list
    pub fn with_providers(
        config: &TomlConfig,
        providers: Vec<RegisteredProvider>,
    ) -> mg_common::Result<Self> {
        let policy = ExplanationPolicy::from_profile(&config.explanation_profile).ok_or_else(|| {
            Error::Config(format!(
                "Unknown explanation profile '{}' (expected 'ownership' or 'takedown')",
                config.explanation_profile
            ))
        })?;

        Ok(Self::new(
            FanOutDispatcher::new(providers, config.dispatch.provider_timeout()),
            policy,
            Arc::new(InMemoryResultStore::new()),
            IntakeValidator::new(&config.limits),
            SlidingWindowLimiter::new(&config.rate_limit),
        ))
    }

    /// Rate-limit, validate, then analyze one upload
    ///
    /// # Errors
    /// Only intake rejections; provider faults are part of the assessment.
    pub async fn submit(
        &self,
        client: &str,
        filename: &str,
        content: impl Into<Arc<[u8]>>,
    ) -> Result<UnifiedAssessment, IntakeError> {
        self.limiter.check(client).await?;

        let content: Arc<[u8]> = content.into();
        let upload = self.validator.validate(filename, &content)?;

        debug!(
            client,
            filename = %upload.filename,
            content_type = %upload.content_type,
            bytes = content.len(),
            "Upload accepted"
        );

        Ok(self
            .analyze(Uuid::new_v4(), &upload.filename, content, &upload.content_type)
            .await)
    }

    /// Run every provider and fuse the results
    ///
    /// Never fails: provider faults become reports, zero successes become a
    /// low-risk assessment.
    pub async fn analyze(
        &self,
        id: Uuid,
        filename: &str,
        content: Arc<[u8]>,
        content_type: &str,
    ) -> UnifiedAssessment {
        let started = Instant::now();
        let file_size = content.len() as u64;
        let content_hash = content_hash(&content);

        let submission = Arc::new(Submission::new(content, content_type, filename));
        let reports = self.dispatcher.dispatch(submission).await;

        let (overall_risk_tier, overall_confidence) = fusion::fuse(&reports);
        let explanation = self.policy.generate(&reports, overall_risk_tier);
        let total_matches = fusion::total_matches(&reports);

        let assessment = UnifiedAssessment {
            id,
            original_filename: filename.to_string(),
            content_hash,
            content_type: content_type.to_string(),
            file_size,
            overall_risk_tier,
            overall_confidence,
            total_matches,
            total_elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            reports,
            risk_factors: explanation.risk_factors,
            recommendations: explanation.recommendations,
            created_at: Utc::now(),
        };

        info!(
            id = %assessment.id,
            filename = %assessment.original_filename,
            risk = %assessment.overall_risk_tier,
            confidence = assessment.overall_confidence,
            matches = assessment.total_matches,
            elapsed_ms = assessment.total_elapsed_ms,
            "Analysis complete"
        );

        self.store.put(assessment.clone()).await;
        assessment
    }

    pub async fn lookup(&self, id: Uuid) -> Option<UnifiedAssessment> {
        self.store.get(id).await
    }

    /// Summaries of the most recent assessments, newest first
    pub async fn list_recent(&self, limit: usize) -> Vec<AssessmentSummary> {
        self.store
            .list_recent(limit)
            .await
            .iter()
            .map(AssessmentSummary::from)
            .collect()
    }

    pub async fn total_analyses(&self) -> usize {
        self.store.len().await
    }

    pub fn provider_status(&self) -> Vec<ProviderStatusEntry> {
        self.dispatcher.provider_status()
    }

    pub fn policy(&self) -> &ExplanationPolicy {
        &self.policy
    }

    pub fn max_file_size(&self) -> usize {
        self.validator.max_file_size()
    }
}
