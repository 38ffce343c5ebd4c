//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entities::Challenge;
use crate::error::PowResult;
use kernel::id::ChallengeId;

/// Result of the single `issued -> consumed` transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    AlreadyConsumed,
    Expired,
    NotFound,
}

/// Challenge repository trait
///
/// There is deliberately no general update: `try_consume` is the only
/// write after `put`.
#[trait_variant::make(ChallengeRepository: Send)]
pub trait LocalChallengeRepository {
    /// Persist a freshly issued challenge
    async fn put(&self, challenge: &Challenge) -> PowResult<()>;

    /// Get a challenge by ID
    async fn get(&self, challenge_id: ChallengeId) -> PowResult<Option<Challenge>>;

    /// Atomically mark an unexpired, unconsumed challenge as consumed
    async fn try_consume(&self, challenge_id: ChallengeId, now_ms: i64)
    -> PowResult<ConsumeOutcome>;

    /// Delete challenges that expired before `now_ms`
    async fn purge_expired(&self, now_ms: i64) -> PowResult<u64>;
}
