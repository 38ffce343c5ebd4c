//! Application Layer
//!
//! Use cases and application services.

pub mod authorize_action;
pub mod cleanup_expired;
pub mod config;
pub mod consume_receipt;
pub mod list_agents;
pub mod provision_managed_agent;
pub mod rate_limiter;
pub mod register_agent;
pub mod request_action_challenge;
pub mod resolve_agent;
pub mod revoke_agent;

// Re-exports
pub use authorize_action::{AuthorizeActionInput, AuthorizeActionOutput, AuthorizeActionUseCase};
pub use cleanup_expired::{CleanupExpiredUseCase, CleanupReport};
pub use config::AgentConfig;
pub use consume_receipt::ConsumeReceiptUseCase;
pub use list_agents::ListAgentsUseCase;
pub use provision_managed_agent::{ProvisionManagedAgentInput, ProvisionManagedAgentUseCase};
pub use rate_limiter::{RateDecision, RateLimiter};
pub use register_agent::{RegisterAgentInput, RegisterAgentOutput, RegisterAgentUseCase};
pub use request_action_challenge::{RequestActionChallengeInput, RequestActionChallengeUseCase};
pub use resolve_agent::{AgentCredential, ResolveAgentUseCase};
pub use revoke_agent::RevokeAgentUseCase;
