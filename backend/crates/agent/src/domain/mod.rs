//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (AgentKey, ActionReceipt)
//! - Domain value objects (AgentName, AgentSecret, ReceiptToken)
//! - Repository traits (interfaces)

pub mod entity;
pub mod repository;
pub mod value_object;
