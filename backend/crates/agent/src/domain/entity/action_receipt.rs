//! Action Receipt Entity
//!
//! Proof that an agent passed key, proof-of-work and rate-limit checks for
//! one action. A downstream write endpoint redeems it exactly once.

use crate::domain::value_object::ReceiptToken;
use chrono::{DateTime, TimeZone, Utc};
use kernel::ActionKind;
use kernel::id::{ActionReceiptId, AgentKeyId, ChallengeId};

#[derive(Debug, Clone)]
pub struct ActionReceipt {
    pub id: ActionReceiptId,
    pub token_hash: String,
    pub agent_key_id: AgentKeyId,
    pub action_kind: ActionKind,
    /// Challenge whose proof paid for this receipt
    pub challenge_id: ChallengeId,
    pub issued_at: DateTime<Utc>,
    pub expires_at_ms: i64,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl ActionReceipt {
    pub fn new(
        token: &ReceiptToken,
        agent_key_id: AgentKeyId,
        action_kind: ActionKind,
        challenge_id: ChallengeId,
        now_ms: i64,
        ttl_ms: i64,
    ) -> Self {
        Self {
            id: ActionReceiptId::new(),
            token_hash: token.hash(),
            agent_key_id,
            action_kind,
            challenge_id,
            issued_at: Utc.timestamp_millis_opt(now_ms).single().unwrap_or_default(),
            expires_at_ms: now_ms + ttl_ms,
            consumed_at: None,
        }
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }

    /// Redeemable right now for `expected` (any kind when `None`)
    pub fn is_redeemable(&self, now_ms: i64, expected: Option<ActionKind>) -> bool {
        self.consumed_at.is_none()
            && !self.is_expired_at(now_ms)
            && expected.is_none_or(|kind| kind == self.action_kind)
    }
}

/// Identity attached to a request that redeemed a receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPrincipal {
    pub agent_key_id: AgentKeyId,
    pub username: String,
    pub action_kind: ActionKind,
    pub receipt_id: ActionReceiptId,
}
