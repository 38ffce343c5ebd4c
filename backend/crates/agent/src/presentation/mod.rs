//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::{AgentAppState, AgentStore, ChallengeStore};
pub use middleware::{AdminToken, ReceiptGuard, require_action_receipt, require_admin_token};
pub use router::{agent_router, agent_router_generic};
