//! PoW (Proof of Work) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Challenge entity, value objects, hashing, repository traits
//! - `application/` - Use cases (issue, verify, bounded mining)
//! - `infra/` - PostgreSQL and in-memory implementations
//!
//! ## Security Model
//! - Backend is the sole authority for prefix, difficulty, TTL, and verification
//! - Prefixes carry 128 bits of randomness, so solutions never transfer between challenges
//! - Challenge consumption is atomic (no double-spend)
//! - Expired challenges are never consumable, even with a correct nonce

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::{ChallengePolicy, MiningBudget, PowConfig};
pub use application::issue_challenge::{
    IssueChallengeInput, IssueChallengeOutput, IssueChallengeUseCase,
};
pub use application::mine_solution::{MineSolutionUseCase, MinedSolution};
pub use application::verify_solution::{VerifySolutionInput, VerifySolutionUseCase};
pub use domain::entities::Challenge;
pub use domain::repository::{ChallengeRepository, ConsumeOutcome};
pub use domain::value_objects::{ChallengeKind, ChallengeScope, Difficulty};
pub use error::{PowError, PowResult};
pub use infra::postgres::PgPowRepository;

#[cfg(any(test, feature = "memory"))]
pub use infra::memory::MemoryPowRepository;
