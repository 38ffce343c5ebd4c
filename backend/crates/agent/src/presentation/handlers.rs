//! HTTP Handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;

use platform::client::extract_agent_secret;
use pow::{ChallengeKind, ChallengeRepository, IssueChallengeInput, IssueChallengeUseCase, PowConfig};

use crate::application::config::AgentConfig;
use crate::application::{
    AgentCredential, AuthorizeActionInput, AuthorizeActionUseCase, ConsumeReceiptUseCase,
    ListAgentsUseCase, ProvisionManagedAgentInput, ProvisionManagedAgentUseCase,
    RateLimiter, RegisterAgentInput, RegisterAgentUseCase, RequestActionChallengeInput,
    RequestActionChallengeUseCase, ResolveAgentUseCase, RevokeAgentUseCase,
};
use crate::domain::repository::{AgentKeyRepository, RateLimitRepository, ReceiptRepository};
use crate::error::{AgentError, AgentResult};
use crate::presentation::dto::{
    ActionTokenRequest, ActionTokenResponse, AgentSummaryResponse, ChallengeRequest,
    ChallengeResponse, ConsumeReceiptRequest, ConsumeReceiptResponse, ProvisionAgentRequest,
    RateLimitResponse, RegisterRequest, RegisterResponse, parse_action_kind, parse_agent_key_id,
    parse_challenge_id,
};

/// Every agent table behind one handle
pub trait AgentStore:
    AgentKeyRepository + RateLimitRepository + ReceiptRepository + Clone + Send + Sync + 'static
{
}

impl<T> AgentStore for T where
    T: AgentKeyRepository + RateLimitRepository + ReceiptRepository + Clone + Send + Sync + 'static
{
}

/// Challenge table handle usable from handlers
pub trait ChallengeStore: ChallengeRepository + Clone + Send + Sync + 'static {}

impl<T> ChallengeStore for T where T: ChallengeRepository + Clone + Send + Sync + 'static {}

/// Shared state for agent handlers
#[derive(Clone)]
pub struct AgentAppState<C, R>
where
    C: ChallengeStore,
    R: AgentStore,
{
    pub challenges: Arc<C>,
    pub repo: Arc<R>,
    pub pow_config: Arc<PowConfig>,
    pub config: Arc<AgentConfig>,
}

// ============================================================================
// Challenge
// ============================================================================

/// POST /api/agent/challenge
pub async fn issue_challenge<C, R>(
    State(state): State<AgentAppState<C, R>>,
    headers: HeaderMap,
    body: Result<Json<ChallengeRequest>, JsonRejection>,
) -> AgentResult<(StatusCode, Json<ChallengeResponse>)>
where
    C: ChallengeStore,
    R: AgentStore,
{
    let Json(req) = body?;

    let output = match req.kind {
        ChallengeKind::Registration => {
            IssueChallengeUseCase::new(state.challenges.clone(), state.pow_config.clone())
                .execute(IssueChallengeInput::registration())
                .await?
        }
        ChallengeKind::Action => {
            let action_kind = req
                .action_kind
                .as_deref()
                .ok_or_else(|| AgentError::Validation("actionKind is required".into()))
                .and_then(parse_action_kind)?;
            let secret = match extract_agent_secret(&headers) {
                Ok(secret) => secret,
                Err(e) => req.agent_key.clone().ok_or(AgentError::from(e))?,
            };

            RequestActionChallengeUseCase::new(
                state.challenges.clone(),
                state.repo.clone(),
                state.repo.clone(),
                state.pow_config.clone(),
                state.config.clone(),
            )
            .execute(RequestActionChallengeInput {
                credential: AgentCredential::secret(secret),
                action_kind,
            })
            .await?
        }
    };

    Ok((StatusCode::CREATED, Json(output.into())))
}

// ============================================================================
// Register
// ============================================================================

/// POST /api/agent/register
pub async fn register<C, R>(
    State(state): State<AgentAppState<C, R>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AgentResult<(StatusCode, Json<RegisterResponse>)>
where
    C: ChallengeStore,
    R: AgentStore,
{
    let Json(req) = body?;

    let use_case = RegisterAgentUseCase::new(
        state.challenges.clone(),
        state.repo.clone(),
        state.pow_config.clone(),
        state.config.clone(),
    );

    let output = use_case
        .execute(RegisterAgentInput {
            challenge_id: parse_challenge_id(&req.challenge_id)?,
            nonce: req.nonce,
            username: req.username,
            description: req.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(output.into())))
}

// ============================================================================
// Action Token
// ============================================================================

/// POST /api/agent/action-token
pub async fn action_token<C, R>(
    State(state): State<AgentAppState<C, R>>,
    headers: HeaderMap,
    body: Result<Json<ActionTokenRequest>, JsonRejection>,
) -> AgentResult<Json<ActionTokenResponse>>
where
    C: ChallengeStore,
    R: AgentStore,
{
    let secret = extract_agent_secret(&headers)?;
    let Json(req) = body?;

    let input = AuthorizeActionInput {
        credential: AgentCredential::secret(secret),
        challenge_id: parse_challenge_id(&req.challenge_id)?,
        nonce: req.nonce,
        action_kind: parse_action_kind(&req.action_kind)?,
    };

    let use_case = AuthorizeActionUseCase::new(
        state.challenges.clone(),
        state.repo.clone(),
        state.repo.clone(),
        state.repo.clone(),
        state.pow_config.clone(),
        state.config.clone(),
    );

    let output = use_case.execute(input).await?;

    Ok(Json(output.into()))
}

// ============================================================================
// Receipts
// ============================================================================

/// POST /api/agent/receipts/consume
pub async fn consume_receipt<C, R>(
    State(state): State<AgentAppState<C, R>>,
    body: Result<Json<ConsumeReceiptRequest>, JsonRejection>,
) -> AgentResult<Json<ConsumeReceiptResponse>>
where
    C: ChallengeStore,
    R: AgentStore,
{
    let Json(req) = body?;
    let expected = req.action_kind.as_deref().map(parse_action_kind).transpose()?;

    let principal = ConsumeReceiptUseCase::new(state.repo.clone(), state.repo.clone(), state.config.clone())
        .execute(&req.receipt, expected)
        .await?;

    Ok(Json(principal.into()))
}

// ============================================================================
// Rate Limit Status
// ============================================================================

/// GET /api/agent/rate-limit/{actionKind}
pub async fn rate_limit_status<C, R>(
    State(state): State<AgentAppState<C, R>>,
    headers: HeaderMap,
    Path(action_kind): Path<String>,
) -> AgentResult<Json<RateLimitResponse>>
where
    C: ChallengeStore,
    R: AgentStore,
{
    let action_kind = parse_action_kind(&action_kind)?;
    let credential = AgentCredential::secret(extract_agent_secret(&headers)?);

    let key = ResolveAgentUseCase::new(state.repo.clone())
        .require_active(&credential)
        .await?;

    let snapshot = RateLimiter::new(state.repo.clone(), state.config.clone())
        .peek(key.id, action_kind)
        .await?;

    Ok(Json(RateLimitResponse::new(action_kind, &snapshot)))
}

// ============================================================================
// Admin (behind `require_admin_token`)
// ============================================================================

/// GET /api/agent/admin/agents
pub async fn list_agents<C, R>(
    State(state): State<AgentAppState<C, R>>,
) -> AgentResult<Json<Vec<AgentSummaryResponse>>>
where
    C: ChallengeStore,
    R: AgentStore,
{
    let keys = ListAgentsUseCase::new(state.repo.clone()).execute().await?;
    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// POST /api/agent/admin/agents/{id}/revoke
pub async fn revoke_agent<C, R>(
    State(state): State<AgentAppState<C, R>>,
    Path(agent_key_id): Path<String>,
) -> AgentResult<StatusCode>
where
    C: ChallengeStore,
    R: AgentStore,
{
    let agent_key_id = parse_agent_key_id(&agent_key_id)?;

    RevokeAgentUseCase::new(state.repo.clone(), state.config.clone())
        .execute(agent_key_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/agent/admin/agents/managed
pub async fn provision_managed_agent<C, R>(
    State(state): State<AgentAppState<C, R>>,
    body: Result<Json<ProvisionAgentRequest>, JsonRejection>,
) -> AgentResult<(StatusCode, Json<RegisterResponse>)>
where
    C: ChallengeStore,
    R: AgentStore,
{
    let Json(req) = body?;

    let use_case = ProvisionManagedAgentUseCase::new(
        state.challenges.clone(),
        state.repo.clone(),
        state.pow_config.clone(),
        state.config.clone(),
    );

    let output = use_case
        .execute(ProvisionManagedAgentInput {
            username: req.username,
            description: req.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(output.into())))
}
