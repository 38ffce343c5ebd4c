//! List Agents Use Case

use std::sync::Arc;

use crate::domain::entity::AgentKey;
use crate::domain::repository::AgentKeyRepository;
use crate::error::AgentResult;

/// List agents use case
///
/// Keys come back with their hint only; no read path carries a secret.
pub struct ListAgentsUseCase<K>
where
    K: AgentKeyRepository,
{
    key_repo: Arc<K>,
}

impl<K> ListAgentsUseCase<K>
where
    K: AgentKeyRepository,
{
    pub fn new(key_repo: Arc<K>) -> Self {
        Self { key_repo }
    }

    pub async fn execute(&self) -> AgentResult<Vec<AgentKey>> {
        self.key_repo.list().await
    }
}
