//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (randomness, SHA-256, hex/base64, constant-time compare)
//! - Clock abstraction (system clock and a manual clock for tests)
//! - Fixed-window rate limit arithmetic
//! - Request header helpers (agent credentials, client IP)

pub mod client;
pub mod clock;
pub mod crypto;
pub mod rate_limit;
