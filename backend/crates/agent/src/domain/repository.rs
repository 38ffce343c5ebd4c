//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.

use crate::domain::entity::{ActionReceipt, AgentKey};
use crate::domain::value_object::AgentName;
use crate::error::AgentResult;
use chrono::{DateTime, Utc};
use kernel::ActionKind;
use kernel::id::AgentKeyId;

/// Agent key repository trait
#[trait_variant::make(AgentKeyRepository: Send)]
pub trait LocalAgentKeyRepository {
    /// Insert a new key; fails with `UsernameTaken` on a name collision
    async fn create(&self, key: &AgentKey) -> AgentResult<()>;

    /// Find key by ID
    async fn find_by_id(&self, id: AgentKeyId) -> AgentResult<Option<AgentKey>>;

    /// Find key by the SHA-256 of its secret
    async fn find_by_secret_hash(&self, secret_hash: &str) -> AgentResult<Option<AgentKey>>;

    /// Check if a username is bound to any key, revoked ones included
    async fn exists_by_username(&self, username: &AgentName) -> AgentResult<bool>;

    /// Set `is_active = false`; returns whether the key exists
    async fn deactivate(&self, id: AgentKeyId, at: DateTime<Utc>) -> AgentResult<bool>;

    /// Bump the observability counter and `last_used_at`
    async fn record_action(
        &self,
        id: AgentKeyId,
        kind: ActionKind,
        at: DateTime<Utc>,
    ) -> AgentResult<()>;

    /// All keys, newest first
    async fn list(&self) -> AgentResult<Vec<AgentKey>>;
}

/// Rate limit counter repository trait
///
/// Counters are keyed by `(agent_key_id, action_kind, window_start_ms)`.
#[trait_variant::make(RateLimitRepository: Send)]
pub trait LocalRateLimitRepository {
    /// Atomically increment the counter unless it already reached `ceiling`
    ///
    /// Returns the post-increment count, or `None` when denied. Never
    /// implemented as a read followed by a write.
    async fn check_and_increment(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
        ceiling: u32,
    ) -> AgentResult<Option<u32>>;

    /// Current count for a window (0 when the row does not exist yet)
    async fn current_count(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
    ) -> AgentResult<u32>;

    /// Give back one slot taken by `check_and_increment`
    ///
    /// Used when the authorization that took the slot failed before a
    /// receipt was stored. Never drops the count below zero.
    async fn release(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
    ) -> AgentResult<()>;

    /// Delete windows that started before `cutoff_ms`
    async fn purge_windows_before(&self, cutoff_ms: i64) -> AgentResult<u64>;
}

/// Action receipt repository trait
#[trait_variant::make(ReceiptRepository: Send)]
pub trait LocalReceiptRepository {
    async fn create(&self, receipt: &ActionReceipt) -> AgentResult<()>;

    /// Atomically mark an unexpired, unconsumed receipt as consumed
    ///
    /// `expected` restricts the action kind; `None` accepts any kind.
    /// Returns the receipt only to the single caller that consumed it.
    async fn consume(
        &self,
        token_hash: &str,
        expected: Option<ActionKind>,
        now_ms: i64,
    ) -> AgentResult<Option<ActionReceipt>>;

    /// Delete receipts that expired before `now_ms`
    async fn purge_expired(&self, now_ms: i64) -> AgentResult<u64>;
}
