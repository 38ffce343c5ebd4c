//! Consume Receipt Use Case
//!
//! Called by downstream write endpoints. A receipt validates at most once.

use std::sync::Arc;

use kernel::ActionKind;

use crate::application::config::AgentConfig;
use crate::domain::entity::AgentPrincipal;
use crate::domain::repository::{AgentKeyRepository, ReceiptRepository};
use crate::domain::value_object::ReceiptToken;
use crate::error::{AgentError, AgentResult};

/// Longest token we bother hashing
const MAX_TOKEN_LEN: usize = 256;

/// Consume receipt use case
pub struct ConsumeReceiptUseCase<P, K>
where
    P: ReceiptRepository,
    K: AgentKeyRepository,
{
    receipt_repo: Arc<P>,
    key_repo: Arc<K>,
    config: Arc<AgentConfig>,
}

impl<P, K> ConsumeReceiptUseCase<P, K>
where
    P: ReceiptRepository,
    K: AgentKeyRepository,
{
    pub fn new(receipt_repo: Arc<P>, key_repo: Arc<K>, config: Arc<AgentConfig>) -> Self {
        Self {
            receipt_repo,
            key_repo,
            config,
        }
    }

    /// Redeem `token`, optionally only for the `expected` action kind
    pub async fn execute(
        &self,
        token: &str,
        expected: Option<ActionKind>,
    ) -> AgentResult<AgentPrincipal> {
        let token = token.trim();
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(AgentError::ReceiptInvalid);
        }
        let token = ReceiptToken::presented(token);

        let receipt = self
            .receipt_repo
            .consume(&token.hash(), expected, self.config.now_ms())
            .await?
            .ok_or(AgentError::ReceiptInvalid)?;

        // Revocation after issuance still blocks the write
        let key = self
            .key_repo
            .find_by_id(receipt.agent_key_id)
            .await?
            .ok_or(AgentError::KeyNotFound)?;
        key.ensure_active()?;

        tracing::info!(
            receipt_id = %receipt.id,
            agent_key_id = %key.id,
            action_kind = %receipt.action_kind,
            "Action receipt consumed"
        );

        Ok(AgentPrincipal {
            agent_key_id: key.id,
            username: key.username.into_inner(),
            action_kind: receipt.action_kind,
            receipt_id: receipt.id,
        })
    }
}
