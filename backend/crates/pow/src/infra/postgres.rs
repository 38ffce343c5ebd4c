//! PostgreSQL Repository Implementations

use crate::domain::entities::{Challenge, millis_to_datetime};
use crate::domain::repository::{ChallengeRepository, ConsumeOutcome};
use crate::domain::value_objects::{ChallengeKind, ChallengeScope, Difficulty, Prefix};
use crate::error::{PowError, PowResult};
use chrono::{DateTime, Utc};
use kernel::ActionKind;
use kernel::id::{AgentKeyId, ChallengeId};
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgPowRepository {
    pool: PgPool,
}

impl PgPowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ChallengeRepository for PgPowRepository {
    async fn put(&self, challenge: &Challenge) -> PowResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_challenges (
                challenge_id,
                kind,
                agent_key_id,
                action_kind,
                prefix,
                difficulty,
                issued_at,
                expires_at_ms
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(challenge.id.into_uuid())
        .bind(challenge.scope.kind().code())
        .bind(challenge.scope.agent_key_id().map(AgentKeyId::into_uuid))
        .bind(challenge.scope.action_kind().map(|k| k.id()))
        .bind(challenge.prefix.as_str())
        .bind(i16::from(challenge.difficulty.digits()))
        .bind(challenge.issued_at)
        .bind(challenge.expires_at_ms)
        .execute(&self.pool)
        .await?;

        tracing::debug!(challenge_id = %challenge.id, "Challenge stored");
        Ok(())
    }

    async fn get(&self, challenge_id: ChallengeId) -> PowResult<Option<Challenge>> {
        let row = sqlx::query_as::<_, ChallengeRow>(
            r#"
            SELECT
                challenge_id,
                kind,
                agent_key_id,
                action_kind,
                prefix,
                difficulty,
                issued_at,
                expires_at_ms,
                consumed_at
            FROM agent_challenges
            WHERE challenge_id = $1
            "#,
        )
        .bind(challenge_id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChallengeRow::into_challenge).transpose()
    }

    async fn try_consume(
        &self,
        challenge_id: ChallengeId,
        now_ms: i64,
    ) -> PowResult<ConsumeOutcome> {
        // Compare-and-swap on consumed_at; expiry is part of the predicate
        let consumed = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE agent_challenges
            SET consumed_at = $3
            WHERE challenge_id = $1
              AND consumed_at IS NULL
              AND expires_at_ms >= $2
            RETURNING challenge_id
            "#,
        )
        .bind(challenge_id.into_uuid())
        .bind(now_ms)
        .bind(millis_to_datetime(now_ms))
        .fetch_optional(&self.pool)
        .await?;

        if consumed.is_some() {
            tracing::info!(challenge_id = %challenge_id, "Challenge consumed");
            return Ok(ConsumeOutcome::Consumed);
        }

        // Lost the race or the row is gone: find out which for the caller
        let state = sqlx::query_as::<_, (Option<DateTime<Utc>>,)>(
            "SELECT consumed_at FROM agent_challenges WHERE challenge_id = $1",
        )
        .bind(challenge_id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(match state {
            None => ConsumeOutcome::NotFound,
            Some((Some(_),)) => ConsumeOutcome::AlreadyConsumed,
            Some((None,)) => ConsumeOutcome::Expired,
        })
    }

    async fn purge_expired(&self, now_ms: i64) -> PowResult<u64> {
        let deleted = sqlx::query("DELETE FROM agent_challenges WHERE expires_at_ms < $1")
            .bind(now_ms)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(challenges = deleted, "Purged expired challenges");
        Ok(deleted)
    }
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct ChallengeRow {
    challenge_id: Uuid,
    kind: String,
    agent_key_id: Option<Uuid>,
    action_kind: Option<i16>,
    prefix: String,
    difficulty: i16,
    issued_at: DateTime<Utc>,
    expires_at_ms: i64,
    consumed_at: Option<DateTime<Utc>>,
}

impl ChallengeRow {
    fn into_challenge(self) -> PowResult<Challenge> {
        let corrupt = |what: &str| {
            PowError::Internal(format!("challenge {} has invalid {what}", self.challenge_id))
        };

        let scope = match ChallengeKind::from_code(&self.kind) {
            Some(ChallengeKind::Registration) => ChallengeScope::Registration,
            Some(ChallengeKind::Action) => {
                let agent_key_id = self.agent_key_id.ok_or_else(|| corrupt("agent_key_id"))?;
                let action_kind = self
                    .action_kind
                    .and_then(ActionKind::from_id)
                    .ok_or_else(|| corrupt("action_kind"))?;
                ChallengeScope::action(AgentKeyId::from_uuid(agent_key_id), action_kind)
            }
            None => return Err(corrupt("kind")),
        };

        let difficulty = u8::try_from(self.difficulty)
            .ok()
            .and_then(Difficulty::new)
            .ok_or_else(|| corrupt("difficulty"))?;

        Ok(Challenge {
            id: ChallengeId::from_uuid(self.challenge_id),
            scope,
            prefix: Prefix::from_stored(self.prefix),
            difficulty,
            issued_at: self.issued_at,
            expires_at_ms: self.expires_at_ms,
            consumed_at: self.consumed_at,
        })
    }
}
