//! Agent Key Entity

use crate::domain::value_object::{AgentName, AgentSecret};
use crate::error::{AgentError, AgentResult};
use chrono::{DateTime, Utc};
use kernel::ActionKind;
use kernel::id::AgentKeyId;

/// Per-kind action totals
///
/// Observability only; rate limiting reads the window counters instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub posts: i64,
    pub comments: i64,
}

impl ActionCounts {
    pub fn record(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Post => self.posts += 1,
            ActionKind::Comment => self.comments += 1,
        }
    }
}

/// Capability identity bound to a registered agent
#[derive(Debug, Clone)]
pub struct AgentKey {
    pub id: AgentKeyId,
    pub username: AgentName,
    pub description: Option<String>,
    /// SHA-256 of the secret; the plaintext is never stored
    pub secret_hash: String,
    pub key_hint: String,
    /// Once false, stays false
    pub is_active: bool,
    pub action_counts: ActionCounts,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AgentKey {
    pub fn new(
        username: AgentName,
        description: Option<String>,
        secret: &AgentSecret,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AgentKeyId::new(),
            username,
            description,
            secret_hash: secret.hash(),
            key_hint: secret.hint(),
            is_active: true,
            action_counts: ActionCounts::default(),
            created_at: now,
            last_used_at: None,
            revoked_at: None,
        }
    }

    /// Fail closed on revoked keys
    pub fn ensure_active(&self) -> AgentResult<()> {
        if self.is_active {
            Ok(())
        } else {
            Err(AgentError::KeyInactive)
        }
    }

    pub fn revoke(&mut self, at: DateTime<Utc>) {
        if self.is_active {
            self.is_active = false;
            self.revoked_at = Some(at);
        }
    }
}
