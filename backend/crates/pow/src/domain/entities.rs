//! Domain Entities
//!
//! Core business entities for the PoW domain.

use crate::domain::value_objects::{ChallengeScope, Difficulty, Prefix};
use chrono::{DateTime, TimeZone, Utc};
use kernel::id::ChallengeId;

/// Challenge entity - a single-use puzzle issued to an agent
///
/// The only mutation a challenge ever sees is `consumed_at` going from
/// `None` to `Some`, and that happens inside the repository.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: ChallengeId,
    pub scope: ChallengeScope,
    pub prefix: Prefix,
    pub difficulty: Difficulty,
    pub issued_at: DateTime<Utc>,
    pub expires_at_ms: i64,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl Challenge {
    /// Create a new, unconsumed challenge issued at `now_ms`
    pub fn new(
        scope: ChallengeScope,
        prefix: Prefix,
        difficulty: Difficulty,
        now_ms: i64,
        ttl_ms: i64,
    ) -> Self {
        Self {
            id: ChallengeId::new(),
            scope,
            prefix,
            difficulty,
            issued_at: millis_to_datetime(now_ms),
            expires_at_ms: now_ms + ttl_ms,
            consumed_at: None,
        }
    }

    /// Expired once `now` is strictly past `expires_at`
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        millis_to_datetime(self.expires_at_ms)
    }
}

pub(crate) fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}
