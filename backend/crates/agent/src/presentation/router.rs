//! Agent Router

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;

use pow::{PgPowRepository, PowConfig};

use crate::application::config::AgentConfig;
use crate::infra::postgres::PgAgentRepository;
use crate::presentation::handlers::{self, AgentAppState, AgentStore, ChallengeStore};
use crate::presentation::middleware::{AdminToken, require_admin_token};

/// Create the agent router with PostgreSQL repositories
///
/// Admin routes are mounted only when `admin_token` is non-blank.
pub fn agent_router(
    challenges: PgPowRepository,
    repo: PgAgentRepository,
    pow_config: PowConfig,
    config: AgentConfig,
    admin_token: Option<String>,
) -> Router {
    agent_router_generic(challenges, repo, pow_config, config, admin_token)
}

/// Create a generic agent router for any repository implementation
pub fn agent_router_generic<C, R>(
    challenges: C,
    repo: R,
    pow_config: PowConfig,
    config: AgentConfig,
    admin_token: Option<String>,
) -> Router
where
    C: ChallengeStore,
    R: AgentStore,
{
    let state = AgentAppState {
        challenges: Arc::new(challenges),
        repo: Arc::new(repo),
        pow_config: Arc::new(pow_config),
        config: Arc::new(config),
    };

    let mut router = Router::new()
        .route("/challenge", post(handlers::issue_challenge::<C, R>))
        .route("/register", post(handlers::register::<C, R>))
        .route("/action-token", post(handlers::action_token::<C, R>))
        .route("/receipts/consume", post(handlers::consume_receipt::<C, R>))
        .route(
            "/rate-limit/{action_kind}",
            get(handlers::rate_limit_status::<C, R>),
        );

    if let Some(token) = admin_token.as_deref().and_then(AdminToken::new) {
        let admin = Router::new()
            .route("/agents", get(handlers::list_agents::<C, R>))
            .route("/agents/managed", post(handlers::provision_managed_agent::<C, R>))
            .route("/agents/{id}/revoke", post(handlers::revoke_agent::<C, R>))
            .route_layer(middleware::from_fn_with_state(token, require_admin_token));
        router = router.nest("/admin", admin);
    } else {
        tracing::info!("Agent admin routes disabled (no admin token configured)");
    }

    router.with_state(state)
}
