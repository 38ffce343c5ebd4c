//! API DTOs (Data Transfer Objects)

use chrono::{DateTime, Utc};
use kernel::ActionKind;
use kernel::id::{AgentKeyId, ChallengeId};
use platform::rate_limit::RateLimitSnapshot;
use pow::{ChallengeKind, IssueChallengeOutput};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{AuthorizeActionOutput, RegisterAgentOutput};
use crate::domain::entity::{AgentKey, AgentPrincipal};
use crate::error::{AgentError, AgentResult};

// ============================================================================
// Challenge
// ============================================================================

/// Challenge request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRequest {
    pub kind: ChallengeKind,
    /// Required for `kind = "action"`
    pub action_kind: Option<String>,
    /// Fallback when no `X-Agent-Key` header is sent
    pub agent_key: Option<String>,
}

/// Challenge response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub challenge_id: String,
    pub kind: ChallengeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_kind: Option<ActionKind>,
    pub prefix: String,
    pub difficulty: u8,
    pub expires_at: DateTime<Utc>,
    pub expires_at_ms: i64,
}

impl From<IssueChallengeOutput> for ChallengeResponse {
    fn from(output: IssueChallengeOutput) -> Self {
        Self {
            challenge_id: output.challenge_id.to_string(),
            kind: output.scope.kind(),
            action_kind: output.scope.action_kind(),
            prefix: output.prefix,
            difficulty: output.difficulty.digits(),
            expires_at: output.expires_at,
            expires_at_ms: output.expires_at_ms,
        }
    }
}

// ============================================================================
// Register
// ============================================================================

/// Register request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub challenge_id: String,
    pub nonce: String,
    pub username: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Register response
///
/// The only response that ever contains `secret`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub agent_key_id: String,
    pub username: String,
    pub secret: String,
    pub key_hint: String,
    pub created_at: DateTime<Utc>,
}

impl From<RegisterAgentOutput> for RegisterResponse {
    fn from(output: RegisterAgentOutput) -> Self {
        Self {
            agent_key_id: output.agent_key_id.to_string(),
            secret: output.secret.expose().to_string(),
            username: output.username.into_inner(),
            key_hint: output.key_hint,
            created_at: output.created_at,
        }
    }
}

// ============================================================================
// Action Token
// ============================================================================

/// Action token request (agent key travels in a header)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTokenRequest {
    pub challenge_id: String,
    pub nonce: String,
    pub action_kind: String,
}

/// Rate limit usage
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResponse {
    pub action_kind: ActionKind,
    pub used: u32,
    pub ceiling: u32,
    pub remaining: u32,
    pub window_reset_at_ms: i64,
}

impl RateLimitResponse {
    pub fn new(action_kind: ActionKind, snapshot: &RateLimitSnapshot) -> Self {
        Self {
            action_kind,
            used: snapshot.used,
            ceiling: snapshot.ceiling,
            remaining: snapshot.remaining(),
            window_reset_at_ms: snapshot.reset_at_ms,
        }
    }
}

/// Action token response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTokenResponse {
    /// One-time token for `X-Agent-Token`
    pub receipt: String,
    pub receipt_id: String,
    pub action_kind: ActionKind,
    pub expires_at_ms: i64,
    pub rate_limit: RateLimitResponse,
}

impl From<AuthorizeActionOutput> for ActionTokenResponse {
    fn from(output: AuthorizeActionOutput) -> Self {
        Self {
            receipt: output.receipt.expose().to_string(),
            receipt_id: output.receipt_id.to_string(),
            action_kind: output.action_kind,
            expires_at_ms: output.expires_at_ms,
            rate_limit: RateLimitResponse::new(output.action_kind, &output.rate_limit),
        }
    }
}

// ============================================================================
// Receipts
// ============================================================================

/// Consume receipt request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeReceiptRequest {
    pub receipt: String,
    /// Restrict to one action kind
    #[serde(default)]
    pub action_kind: Option<String>,
}

/// Consume receipt response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeReceiptResponse {
    pub valid: bool,
    pub agent_key_id: String,
    pub username: String,
    pub action_kind: ActionKind,
}

impl From<AgentPrincipal> for ConsumeReceiptResponse {
    fn from(principal: AgentPrincipal) -> Self {
        Self {
            valid: true,
            agent_key_id: principal.agent_key_id.to_string(),
            username: principal.username,
            action_kind: principal.action_kind,
        }
    }
}

// ============================================================================
// Admin
// ============================================================================

/// Agent listing entry, secret masked to its hint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummaryResponse {
    pub agent_key_id: String,
    pub username: String,
    pub description: Option<String>,
    pub key_hint: String,
    pub is_active: bool,
    pub post_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl From<AgentKey> for AgentSummaryResponse {
    fn from(key: AgentKey) -> Self {
        Self {
            agent_key_id: key.id.to_string(),
            username: key.username.into_inner(),
            description: key.description,
            key_hint: key.key_hint,
            is_active: key.is_active,
            post_count: key.action_counts.posts,
            comment_count: key.action_counts.comments,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            revoked_at: key.revoked_at,
        }
    }
}

/// Managed agent provisioning request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionAgentRequest {
    pub username: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Parsing helpers
// ============================================================================

pub fn parse_action_kind(raw: &str) -> AgentResult<ActionKind> {
    ActionKind::from_code(raw).ok_or_else(|| AgentError::Validation(format!("unknown action kind '{raw}'")))
}

pub fn parse_challenge_id(raw: &str) -> AgentResult<ChallengeId> {
    parse_uuid(raw, "challengeId").map(ChallengeId::from_uuid)
}

pub fn parse_agent_key_id(raw: &str) -> AgentResult<AgentKeyId> {
    parse_uuid(raw, "agentKeyId").map(AgentKeyId::from_uuid)
}

fn parse_uuid(raw: &str, field: &str) -> AgentResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AgentError::Validation(format!("{field} is not a valid id")))
}
