//! Application Configuration
//!
//! Configuration for the agent application layer.

use kernel::ActionKind;
use platform::clock::{SharedClock, system_clock};
use platform::rate_limit::RateLimitConfig;
use pow::Difficulty;
use std::time::Duration;

/// Agent application configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Post ceiling (5 per hour)
    pub post_limit: RateLimitConfig,
    /// Comment ceiling (15 per hour)
    pub comment_limit: RateLimitConfig,
    /// How long an action receipt stays redeemable
    pub receipt_ttl: Duration,
    /// Leading tag of every issued secret (`agt`)
    pub secret_prefix: String,
    /// Entropy of the random part of a secret
    pub secret_random_bytes: usize,
    /// Registration difficulty for server-mined managed agents
    pub managed_difficulty: Difficulty,
    pub clock: SharedClock,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            post_limit: RateLimitConfig::per_hour(5),
            comment_limit: RateLimitConfig::per_hour(15),
            receipt_ttl: Duration::from_secs(5 * 60),
            secret_prefix: "agt".to_string(),
            secret_random_bytes: 32,
            managed_difficulty: Difficulty::clamped(4),
            clock: system_clock(),
        }
    }
}

impl AgentConfig {
    /// Looser ceilings for local development
    pub fn development() -> Self {
        Self::default()
            .with_rate_limit(ActionKind::Post, RateLimitConfig::per_hour(50))
            .with_rate_limit(ActionKind::Comment, RateLimitConfig::per_hour(150))
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rate_limit(mut self, kind: ActionKind, limit: RateLimitConfig) -> Self {
        match kind {
            ActionKind::Post => self.post_limit = limit,
            ActionKind::Comment => self.comment_limit = limit,
        }
        self
    }

    /// Ceiling and window for one action kind
    pub fn rate_limit(&self, kind: ActionKind) -> &RateLimitConfig {
        match kind {
            ActionKind::Post => &self.post_limit,
            ActionKind::Comment => &self.comment_limit,
        }
    }

    /// Longest configured window; older counter rows are garbage
    pub fn longest_window(&self) -> Duration {
        ActionKind::ALL
            .iter()
            .map(|kind| self.rate_limit(*kind).window)
            .max()
            .unwrap_or_default()
    }

    pub fn receipt_ttl_ms(&self) -> i64 {
        self.receipt_ttl.as_millis() as i64
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}
