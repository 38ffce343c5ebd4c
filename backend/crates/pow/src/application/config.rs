//! Application Configuration
//!
//! Configuration for the PoW application layer.

use crate::domain::value_objects::{ChallengeKind, Difficulty};
use platform::clock::{SharedClock, system_clock};
use std::time::Duration;

/// Difficulty and lifetime for one kind of challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengePolicy {
    pub difficulty: Difficulty,
    pub ttl: Duration,
}

impl ChallengePolicy {
    pub fn ttl_ms(&self) -> i64 {
        self.ttl.as_millis() as i64
    }
}

/// Upper bound on server-side mining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningBudget {
    pub max_attempts: u64,
    pub time_budget: Duration,
}

impl Default for MiningBudget {
    fn default() -> Self {
        Self {
            max_attempts: 2_000_000,
            time_budget: Duration::from_millis(500),
        }
    }
}

/// PoW application configuration
#[derive(Debug, Clone)]
pub struct PowConfig {
    /// Random bytes per prefix (hex-encoded, so the prefix is twice as long)
    pub prefix_bytes: usize,
    /// Registration challenges: rare, so expensive and long-lived
    pub registration: ChallengePolicy,
    /// Action challenges: frequent, so cheaper and short-lived
    pub action: ChallengePolicy,
    /// Budget for server-assisted mining
    pub mining: MiningBudget,
    pub clock: SharedClock,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            prefix_bytes: 16,
            registration: ChallengePolicy {
                difficulty: Difficulty::clamped(5),
                ttl: Duration::from_secs(600),
            },
            action: ChallengePolicy {
                difficulty: Difficulty::clamped(4),
                ttl: Duration::from_secs(120),
            },
            mining: MiningBudget::default(),
            clock: system_clock(),
        }
    }
}

impl PowConfig {
    /// Cheaper puzzles for local development
    pub fn development() -> Self {
        Self::default().with_difficulties(
            Some(Difficulty::clamped(4)),
            Some(Difficulty::clamped(3)),
        )
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Override both difficulties; `None` keeps the current value
    pub fn with_difficulties(
        mut self,
        registration: Option<Difficulty>,
        action: Option<Difficulty>,
    ) -> Self {
        if let Some(d) = registration {
            self.registration.difficulty = d;
        }
        if let Some(d) = action {
            self.action.difficulty = d;
        }
        self
    }

    pub fn policy(&self, kind: ChallengeKind) -> &ChallengePolicy {
        match kind {
            ChallengeKind::Registration => &self.registration,
            ChallengeKind::Action => &self.action,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Longest challenge TTL, used to size cleanup
    pub fn max_ttl(&self) -> Duration {
        self.registration.ttl.max(self.action.ttl)
    }
}
