//! PostgreSQL Repository Implementations

use crate::domain::entity::{ActionCounts, ActionReceipt, AgentKey};
use crate::domain::repository::{AgentKeyRepository, RateLimitRepository, ReceiptRepository};
use crate::domain::value_object::AgentName;
use crate::error::{AgentError, AgentResult};
use chrono::{DateTime, Utc};
use kernel::ActionKind;
use kernel::id::{ActionReceiptId, AgentKeyId, ChallengeId};
use sqlx::PgPool;
use uuid::Uuid;

/// Unique constraint on the canonical username (see migrations)
const USERNAME_CONSTRAINT: &str = "agent_keys_username_unique";

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgAgentRepository {
    pool: PgPool,
}

impl PgAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Agent Keys
// ============================================================================

const KEY_COLUMNS: &str = r#"
    agent_key_id,
    username,
    description,
    secret_hash,
    key_hint,
    is_active,
    post_count,
    comment_count,
    created_at,
    last_used_at,
    revoked_at
"#;

impl AgentKeyRepository for PgAgentRepository {
    async fn create(&self, key: &AgentKey) -> AgentResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_keys (
                agent_key_id,
                username,
                description,
                secret_hash,
                key_hint,
                is_active,
                post_count,
                comment_count,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(key.id.into_uuid())
        .bind(key.username.as_str())
        .bind(key.description.as_deref())
        .bind(&key.secret_hash)
        .bind(&key.key_hint)
        .bind(key.is_active)
        .bind(key.action_counts.posts)
        .bind(key.action_counts.comments)
        .bind(key.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db)
                if db.is_unique_violation() && db.constraint() == Some(USERNAME_CONSTRAINT) =>
            {
                AgentError::UsernameTaken
            }
            _ => AgentError::Database(e),
        })?;

        tracing::debug!(agent_key_id = %key.id, "Agent key stored");
        Ok(())
    }

    async fn find_by_id(&self, id: AgentKeyId) -> AgentResult<Option<AgentKey>> {
        let row = sqlx::query_as::<_, AgentKeyRow>(&format!(
            "SELECT {KEY_COLUMNS} FROM agent_keys WHERE agent_key_id = $1"
        ))
        .bind(id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AgentKeyRow::into_key))
    }

    async fn find_by_secret_hash(&self, secret_hash: &str) -> AgentResult<Option<AgentKey>> {
        let row = sqlx::query_as::<_, AgentKeyRow>(&format!(
            "SELECT {KEY_COLUMNS} FROM agent_keys WHERE secret_hash = $1"
        ))
        .bind(secret_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AgentKeyRow::into_key))
    }

    async fn exists_by_username(&self, username: &AgentName) -> AgentResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM agent_keys WHERE username = $1)",
        )
        .bind(username.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn deactivate(&self, id: AgentKeyId, at: DateTime<Utc>) -> AgentResult<bool> {
        // revoked_at keeps the first revocation time
        let affected = sqlx::query(
            r#"
            UPDATE agent_keys
            SET is_active = FALSE,
                revoked_at = COALESCE(revoked_at, $2)
            WHERE agent_key_id = $1
            "#,
        )
        .bind(id.into_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    async fn record_action(
        &self,
        id: AgentKeyId,
        kind: ActionKind,
        at: DateTime<Utc>,
    ) -> AgentResult<()> {
        let counter = match kind {
            ActionKind::Post => "post_count",
            ActionKind::Comment => "comment_count",
        };

        sqlx::query(&format!(
            r#"
            UPDATE agent_keys
            SET {counter} = {counter} + 1,
                last_used_at = $2
            WHERE agent_key_id = $1
            "#
        ))
        .bind(id.into_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> AgentResult<Vec<AgentKey>> {
        let rows = sqlx::query_as::<_, AgentKeyRow>(&format!(
            "SELECT {KEY_COLUMNS} FROM agent_keys ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AgentKeyRow::into_key).collect())
    }
}

// ============================================================================
// Rate Limits
// ============================================================================

impl RateLimitRepository for PgAgentRepository {
    async fn check_and_increment(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
        ceiling: u32,
    ) -> AgentResult<Option<u32>> {
        if ceiling == 0 {
            return Ok(None);
        }

        // One statement: the conflict branch only fires below the ceiling,
        // so a full window returns no row and nothing changes
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO agent_rate_limits (agent_key_id, action_kind, window_start_ms, action_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (agent_key_id, action_kind, window_start_ms)
            DO UPDATE SET action_count = agent_rate_limits.action_count + 1
            WHERE agent_rate_limits.action_count < $4
            RETURNING action_count
            "#,
        )
        .bind(agent_key_id.into_uuid())
        .bind(kind.id())
        .bind(window_start_ms)
        .bind(i32::try_from(ceiling).unwrap_or(i32::MAX))
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.map(|c| c.max(0) as u32))
    }

    async fn current_count(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
    ) -> AgentResult<u32> {
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT action_count FROM agent_rate_limits
            WHERE agent_key_id = $1 AND action_kind = $2 AND window_start_ms = $3
            "#,
        )
        .bind(agent_key_id.into_uuid())
        .bind(kind.id())
        .bind(window_start_ms)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.map(|c| c.max(0) as u32).unwrap_or(0))
    }

    async fn release(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
    ) -> AgentResult<()> {
        sqlx::query(
            r#"
            UPDATE agent_rate_limits
            SET action_count = action_count - 1
            WHERE agent_key_id = $1
              AND action_kind = $2
              AND window_start_ms = $3
              AND action_count > 0
            "#,
        )
        .bind(agent_key_id.into_uuid())
        .bind(kind.id())
        .bind(window_start_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_windows_before(&self, cutoff_ms: i64) -> AgentResult<u64> {
        let deleted = sqlx::query("DELETE FROM agent_rate_limits WHERE window_start_ms < $1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Action Receipts
// ============================================================================

impl ReceiptRepository for PgAgentRepository {
    async fn create(&self, receipt: &ActionReceipt) -> AgentResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_action_receipts (
                receipt_id,
                token_hash,
                agent_key_id,
                action_kind,
                challenge_id,
                issued_at,
                expires_at_ms
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(receipt.id.into_uuid())
        .bind(&receipt.token_hash)
        .bind(receipt.agent_key_id.into_uuid())
        .bind(receipt.action_kind.id())
        .bind(receipt.challenge_id.into_uuid())
        .bind(receipt.issued_at)
        .bind(receipt.expires_at_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        expected: Option<ActionKind>,
        now_ms: i64,
    ) -> AgentResult<Option<ActionReceipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            UPDATE agent_action_receipts
            SET consumed_at = $3
            WHERE token_hash = $1
              AND consumed_at IS NULL
              AND expires_at_ms >= $2
              AND ($4::SMALLINT IS NULL OR action_kind = $4)
            RETURNING
                receipt_id,
                token_hash,
                agent_key_id,
                action_kind,
                challenge_id,
                issued_at,
                expires_at_ms,
                consumed_at
            "#,
        )
        .bind(token_hash)
        .bind(now_ms)
        .bind(millis_to_datetime(now_ms))
        .bind(expected.map(|k| k.id()))
        .fetch_optional(&self.pool)
        .await?;

        row.map(ReceiptRow::into_receipt).transpose()
    }

    async fn purge_expired(&self, now_ms: i64) -> AgentResult<u64> {
        let deleted = sqlx::query("DELETE FROM agent_action_receipts WHERE expires_at_ms < $1")
            .bind(now_ms)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

// Internal row types for sqlx mapping
#[derive(sqlx::FromRow)]
struct AgentKeyRow {
    agent_key_id: Uuid,
    username: String,
    description: Option<String>,
    secret_hash: String,
    key_hint: String,
    is_active: bool,
    post_count: i64,
    comment_count: i64,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
}

impl AgentKeyRow {
    fn into_key(self) -> AgentKey {
        AgentKey {
            id: AgentKeyId::from_uuid(self.agent_key_id),
            username: AgentName::from_db(self.username),
            description: self.description,
            secret_hash: self.secret_hash,
            key_hint: self.key_hint,
            is_active: self.is_active,
            action_counts: ActionCounts {
                posts: self.post_count,
                comments: self.comment_count,
            },
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            revoked_at: self.revoked_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    receipt_id: Uuid,
    token_hash: String,
    agent_key_id: Uuid,
    action_kind: i16,
    challenge_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at_ms: i64,
    consumed_at: Option<DateTime<Utc>>,
}

impl ReceiptRow {
    fn into_receipt(self) -> AgentResult<ActionReceipt> {
        let action_kind = ActionKind::from_id(self.action_kind).ok_or_else(|| {
            AgentError::Internal(format!(
                "receipt {} has invalid action_kind {}",
                self.receipt_id, self.action_kind
            ))
        })?;

        Ok(ActionReceipt {
            id: ActionReceiptId::from_uuid(self.receipt_id),
            token_hash: self.token_hash,
            agent_key_id: AgentKeyId::from_uuid(self.agent_key_id),
            action_kind,
            challenge_id: ChallengeId::from_uuid(self.challenge_id),
            issued_at: self.issued_at,
            expires_at_ms: self.expires_at_ms,
            consumed_at: self.consumed_at,
        })
    }
}
