//! In-Memory Repository
//!
//! One mutex over all tables, so every operation that must be atomic in
//! PostgreSQL is atomic here too. Single process only.

use crate::domain::entity::{ActionReceipt, AgentKey};
use crate::domain::repository::{AgentKeyRepository, RateLimitRepository, ReceiptRepository};
use crate::domain::value_object::AgentName;
use crate::error::{AgentError, AgentResult};
use chrono::{DateTime, Utc};
use kernel::ActionKind;
use kernel::id::AgentKeyId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type WindowKey = (AgentKeyId, ActionKind, i64);

#[derive(Default)]
struct Tables {
    keys: HashMap<AgentKeyId, AgentKey>,
    windows: HashMap<WindowKey, u32>,
    receipts: HashMap<String, ActionReceipt>,
}

#[derive(Clone, Default)]
pub struct MemoryAgentRepository {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AgentResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| AgentError::Internal("agent store poisoned".into()))
    }

    /// Number of stored rate-limit windows
    pub fn window_count(&self) -> usize {
        self.lock().map(|t| t.windows.len()).unwrap_or(0)
    }

    /// Number of stored receipts, consumed ones included
    pub fn receipt_count(&self) -> usize {
        self.lock().map(|t| t.receipts.len()).unwrap_or(0)
    }
}

impl AgentKeyRepository for MemoryAgentRepository {
    async fn create(&self, key: &AgentKey) -> AgentResult<()> {
        let mut tables = self.lock()?;
        if tables.keys.values().any(|k| k.username == key.username) {
            return Err(AgentError::UsernameTaken);
        }
        tables.keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AgentKeyId) -> AgentResult<Option<AgentKey>> {
        Ok(self.lock()?.keys.get(&id).cloned())
    }

    async fn find_by_secret_hash(&self, secret_hash: &str) -> AgentResult<Option<AgentKey>> {
        Ok(self
            .lock()?
            .keys
            .values()
            .find(|k| k.secret_hash == secret_hash)
            .cloned())
    }

    async fn exists_by_username(&self, username: &AgentName) -> AgentResult<bool> {
        Ok(self.lock()?.keys.values().any(|k| &k.username == username))
    }

    async fn deactivate(&self, id: AgentKeyId, at: DateTime<Utc>) -> AgentResult<bool> {
        match self.lock()?.keys.get_mut(&id) {
            Some(key) => {
                key.revoke(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_action(
        &self,
        id: AgentKeyId,
        kind: ActionKind,
        at: DateTime<Utc>,
    ) -> AgentResult<()> {
        if let Some(key) = self.lock()?.keys.get_mut(&id) {
            key.action_counts.record(kind);
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn list(&self) -> AgentResult<Vec<AgentKey>> {
        let mut keys: Vec<AgentKey> = self.lock()?.keys.values().cloned().collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }
}

impl RateLimitRepository for MemoryAgentRepository {
    async fn check_and_increment(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
        ceiling: u32,
    ) -> AgentResult<Option<u32>> {
        let mut tables = self.lock()?;
        let count = tables
            .windows
            .entry((agent_key_id, kind, window_start_ms))
            .or_insert(0);
        if *count >= ceiling {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }

    async fn current_count(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
    ) -> AgentResult<u32> {
        Ok(self
            .lock()?
            .windows
            .get(&(agent_key_id, kind, window_start_ms))
            .copied()
            .unwrap_or(0))
    }

    async fn release(
        &self,
        agent_key_id: AgentKeyId,
        kind: ActionKind,
        window_start_ms: i64,
    ) -> AgentResult<()> {
        if let Some(count) = self
            .lock()?
            .windows
            .get_mut(&(agent_key_id, kind, window_start_ms))
        {
            *count = count.saturating_sub(1);
        }
        Ok(())
    }

    async fn purge_windows_before(&self, cutoff_ms: i64) -> AgentResult<u64> {
        let mut tables = self.lock()?;
        let before = tables.windows.len();
        tables.windows.retain(|(_, _, start), _| *start >= cutoff_ms);
        Ok((before - tables.windows.len()) as u64)
    }
}

impl ReceiptRepository for MemoryAgentRepository {
    async fn create(&self, receipt: &ActionReceipt) -> AgentResult<()> {
        self.lock()?
            .receipts
            .insert(receipt.token_hash.clone(), receipt.clone());
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &str,
        expected: Option<ActionKind>,
        now_ms: i64,
    ) -> AgentResult<Option<ActionReceipt>> {
        let mut tables = self.lock()?;
        let Some(receipt) = tables.receipts.get_mut(token_hash) else {
            return Ok(None);
        };
        if !receipt.is_redeemable(now_ms, expected) {
            return Ok(None);
        }
        receipt.consumed_at = Some(DateTime::from_timestamp_millis(now_ms).unwrap_or_default());
        Ok(Some(receipt.clone()))
    }

    async fn purge_expired(&self, now_ms: i64) -> AgentResult<u64> {
        let mut tables = self.lock()?;
        let before = tables.receipts.len();
        tables.receipts.retain(|_, r| !r.is_expired_at(now_ms));
        Ok((before - tables.receipts.len()) as u64)
    }
}
