//! Revoke Agent Use Case

use std::sync::Arc;

use kernel::id::AgentKeyId;

use crate::application::config::AgentConfig;
use crate::domain::repository::AgentKeyRepository;
use crate::error::{AgentError, AgentResult};

/// Revoke agent use case
///
/// Soft revocation: the row and its username stay, `is_active` goes
/// false for good. Revoking twice is not an error.
pub struct RevokeAgentUseCase<K>
where
    K: AgentKeyRepository,
{
    key_repo: Arc<K>,
    config: Arc<AgentConfig>,
}

impl<K> RevokeAgentUseCase<K>
where
    K: AgentKeyRepository,
{
    pub fn new(key_repo: Arc<K>, config: Arc<AgentConfig>) -> Self {
        Self { key_repo, config }
    }

    pub async fn execute(&self, agent_key_id: AgentKeyId) -> AgentResult<()> {
        let found = self
            .key_repo
            .deactivate(agent_key_id, self.config.clock.now())
            .await?;

        if !found {
            return Err(AgentError::KeyNotFound);
        }

        tracing::info!(agent_key_id = %agent_key_id, "Agent key revoked");
        Ok(())
    }
}
