//! Domain Entities

pub mod action_receipt;
pub mod agent_key;

pub use action_receipt::{ActionReceipt, AgentPrincipal};
pub use agent_key::{ActionCounts, AgentKey};
