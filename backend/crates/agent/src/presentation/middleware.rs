//! Agent Middleware
//!
//! - `require_action_receipt` guards downstream write routes: it redeems
//!   the `X-Agent-Token` receipt and hands the route an `AgentPrincipal`.
//! - `require_admin_token` guards the operator routes.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use kernel::ActionKind;
use platform::client::{ADMIN_TOKEN_HEADER, AGENT_TOKEN_HEADER, header_value, require_header};
use platform::crypto::{constant_time_eq, sha256};
use std::sync::Arc;

use crate::application::ConsumeReceiptUseCase;
use crate::application::config::AgentConfig;
use crate::error::AgentError;
use crate::presentation::handlers::AgentStore;

/// Middleware state for receipt-gated routes
#[derive(Clone)]
pub struct ReceiptGuard<R>
where
    R: AgentStore,
{
    pub repo: Arc<R>,
    pub config: Arc<AgentConfig>,
    /// Only receipts for this kind pass; `None` accepts any kind
    pub action_kind: Option<ActionKind>,
}

impl<R> ReceiptGuard<R>
where
    R: AgentStore,
{
    pub fn new(repo: Arc<R>, config: Arc<AgentConfig>, action_kind: Option<ActionKind>) -> Self {
        Self {
            repo,
            config,
            action_kind,
        }
    }
}

/// Middleware that requires an unused action receipt
///
/// The receipt is consumed before the inner handler runs, so a failing
/// write still spends it.
pub async fn require_action_receipt<R>(
    State(guard): State<ReceiptGuard<R>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AgentError>
where
    R: AgentStore,
{
    let token = require_header(req.headers(), AGENT_TOKEN_HEADER)?;

    let principal = ConsumeReceiptUseCase::new(guard.repo.clone(), guard.repo.clone(), guard.config.clone())
        .execute(&token, guard.action_kind)
        .await?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Operator token for admin routes
#[derive(Clone)]
pub struct AdminToken(Arc<str>);

impl AdminToken {
    /// `None` for a blank token, which disables the admin routes
    pub fn new(token: impl AsRef<str>) -> Option<Self> {
        let token = token.as_ref().trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(Arc::from(token)))
        }
    }

    /// Compare digests so the timing does not depend on the length either
    pub fn matches(&self, presented: &str) -> bool {
        constant_time_eq(&sha256(self.0.as_bytes()), &sha256(presented.as_bytes()))
    }
}

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminToken([REDACTED])")
    }
}

/// Middleware that requires the operator token
pub async fn require_admin_token(
    State(token): State<AdminToken>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AgentError> {
    let authorized = header_value(req.headers(), ADMIN_TOKEN_HEADER)
        .is_some_and(|presented| token.matches(&presented));

    if !authorized {
        return Err(AgentError::AdminUnauthorized);
    }

    Ok(next.run(req).await)
}
