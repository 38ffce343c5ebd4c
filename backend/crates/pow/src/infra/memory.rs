//! In-Memory Repository
//!
//! Mutex-guarded map with the same consume semantics as the PostgreSQL
//! implementation. Single process only.

use crate::domain::entities::{Challenge, millis_to_datetime};
use crate::domain::repository::{ChallengeRepository, ConsumeOutcome};
use crate::error::{PowError, PowResult};
use kernel::id::ChallengeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Default)]
pub struct MemoryPowRepository {
    challenges: Arc<Mutex<HashMap<ChallengeId, Challenge>>>,
}

impl MemoryPowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PowResult<MutexGuard<'_, HashMap<ChallengeId, Challenge>>> {
        self.challenges
            .lock()
            .map_err(|_| PowError::Internal("challenge store poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChallengeRepository for MemoryPowRepository {
    async fn put(&self, challenge: &Challenge) -> PowResult<()> {
        self.lock()?.insert(challenge.id, challenge.clone());
        Ok(())
    }

    async fn get(&self, challenge_id: ChallengeId) -> PowResult<Option<Challenge>> {
        Ok(self.lock()?.get(&challenge_id).cloned())
    }

    async fn try_consume(
        &self,
        challenge_id: ChallengeId,
        now_ms: i64,
    ) -> PowResult<ConsumeOutcome> {
        let mut challenges = self.lock()?;
        let Some(challenge) = challenges.get_mut(&challenge_id) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if challenge.is_consumed() {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }
        if challenge.is_expired_at(now_ms) {
            return Ok(ConsumeOutcome::Expired);
        }
        challenge.consumed_at = Some(millis_to_datetime(now_ms));
        Ok(ConsumeOutcome::Consumed)
    }

    async fn purge_expired(&self, now_ms: i64) -> PowResult<u64> {
        let mut challenges = self.lock()?;
        let before = challenges.len();
        challenges.retain(|_, c| c.expires_at_ms >= now_ms);
        Ok((before - challenges.len()) as u64)
    }
}
