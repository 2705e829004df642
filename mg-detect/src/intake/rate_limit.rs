//! Sliding-window rate limiter
//!
//! Keeps the instants of accepted submissions per client and checks two
//! windows: the last 60 seconds and the last hour. A rejected attempt is not
//! recorded. At most once a minute a check also evicts clients whose newest
//! hit has left the hour window, so the table stays bounded by recent traffic.

use super::IntakeError;
use mg_common::config::RateLimitConfig;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Interval between idle-client sweeps
const SWEEP_INTERVAL: Duration = MINUTE;

#[derive(Debug, Default)]
struct Windows {
    hits: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl Windows {
    fn sweep_if_due(&mut self, now: Instant) {
        let due = self
            .last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= SWEEP_INTERVAL);
        if !due {
            return;
        }

        let before = self.hits.len();
        self.hits.retain(|_, history| {
            history
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < HOUR)
        });
        self.last_sweep = Some(now);

        let evicted = before - self.hits.len();
        if evicted > 0 {
            debug!(evicted, tracked = self.hits.len(), "Evicted idle rate-limit clients");
        }
    }
}

/// Per-client two-window limiter
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    per_minute: usize,
    per_hour: usize,
    windows: Mutex<Windows>,
}

impl SlidingWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            per_minute: config.per_minute,
            per_hour: config.per_hour,
            windows: Mutex::new(Windows::default()),
        }
    }

    /// Record a submission from `client` if both windows allow it
    pub async fn check(&self, client: &str) -> Result<(), IntakeError> {
        self.check_at(client, Instant::now()).await
    }

    /// [`check`](Self::check) against an explicit clock reading
    pub async fn check_at(&self, client: &str, now: Instant) -> Result<(), IntakeError> {
        let mut windows = self.windows.lock().await;
        windows.sweep_if_due(now);
        let history = windows.hits.entry(client.to_string()).or_default();

        while history
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= HOUR)
        {
            history.pop_front();
        }

        let last_minute = history
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < MINUTE)
            .count();

        if last_minute >= self.per_minute {
            warn!(client, limit = self.per_minute, "Per-minute rate limit exceeded");
            return Err(IntakeError::RateLimited {
                window: "minute",
                limit: self.per_minute,
            });
        }

        if history.len() >= self.per_hour {
            warn!(client, limit = self.per_hour, "Per-hour rate limit exceeded");
            return Err(IntakeError::RateLimited {
                window: "hour",
                limit: self.per_hour,
            });
        }

        history.push_back(now);
        debug!(client, last_minute = last_minute + 1, last_hour = history.len(), "Submission admitted");
        Ok(())
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.hits.len()
    }
}
