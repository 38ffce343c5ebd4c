//! Agent Trust Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Agent keys, receipts, value objects, repository traits
//! - `application/` - Use cases (registration, action authorization, rate limiting)
//! - `infra/` - PostgreSQL and in-memory implementations
//! - `presentation/` - HTTP handlers, DTOs, router, middleware
//!
//! ## Flow
//! 1. `POST /challenge` (registration) -> solve -> `POST /register` -> secret, shown once
//! 2. `POST /challenge` (action, with key) -> solve -> `POST /action-token` -> receipt
//! 3. Downstream write route redeems the receipt exactly once
//!
//! ## Security Model
//! - Secrets and receipts are stored as SHA-256 digests only
//! - Revoked keys fail closed on every path, including receipt redemption
//! - Rate limits are durable fixed-window counters incremented atomically
//! - A proof is spent even when the rate limiter rejects the action

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AgentConfig;
pub use application::{CleanupExpiredUseCase, CleanupReport};
pub use domain::entity::AgentPrincipal;
pub use error::{AgentError, AgentResult};
pub use infra::postgres::PgAgentRepository;
pub use presentation::router::{agent_router, agent_router_generic};

#[cfg(any(test, feature = "memory"))]
pub use infra::memory::MemoryAgentRepository;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod middleware {
    pub use crate::presentation::middleware::*;
}

#[cfg(test)]
mod tests;
