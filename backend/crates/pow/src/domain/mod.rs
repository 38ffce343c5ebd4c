//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Challenge)
//! - Domain value objects (ChallengeScope, Difficulty, Prefix, Nonce)
//! - Domain services (PoW hashing, verification and mining)
//! - Repository traits (interfaces)

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
