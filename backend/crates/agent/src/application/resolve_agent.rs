//! Resolve Agent Use Case
//!
//! Turns a presented credential into an `AgentKey`. Authorization paths
//! go through `require_active`, which fails closed on revoked keys.

use std::sync::Arc;

use crate::domain::entity::AgentKey;
use crate::domain::repository::AgentKeyRepository;
use crate::domain::value_object::AgentSecret;
use crate::error::{AgentError, AgentResult};
use kernel::id::AgentKeyId;

/// Secret presented by the agent, or an id known server-side
#[derive(Debug)]
pub enum AgentCredential {
    Secret(AgentSecret),
    Id(AgentKeyId),
}

impl AgentCredential {
    pub fn secret(raw: impl Into<String>) -> Self {
        Self::Secret(AgentSecret::presented(raw))
    }
}

/// Resolve agent use case
pub struct ResolveAgentUseCase<K>
where
    K: AgentKeyRepository,
{
    key_repo: Arc<K>,
}

impl<K> ResolveAgentUseCase<K>
where
    K: AgentKeyRepository,
{
    pub fn new(key_repo: Arc<K>) -> Self {
        Self { key_repo }
    }

    /// Find the key, active or not
    pub async fn lookup(&self, credential: &AgentCredential) -> AgentResult<AgentKey> {
        let found = match credential {
            AgentCredential::Secret(secret) => {
                self.key_repo.find_by_secret_hash(&secret.hash()).await?
            }
            AgentCredential::Id(id) => self.key_repo.find_by_id(*id).await?,
        };
        found.ok_or(AgentError::KeyNotFound)
    }

    /// Find the key and refuse it unless it is still active
    pub async fn require_active(&self, credential: &AgentCredential) -> AgentResult<AgentKey> {
        let key = self.lookup(credential).await?;
        if let Err(e) = key.ensure_active() {
            tracing::warn!(agent_key_id = %key.id, "Revoked agent key presented");
            return Err(e);
        }
        Ok(key)
    }
}
