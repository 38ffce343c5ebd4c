//! Shared Kernel - Vocabulary shared by the agent trust crates
//!
//! This crate contains the small core every other crate agrees on:
//! - Unified error type ([`error::app_error::AppError`]) with stable machine codes
//! - Typed identifiers for challenges, agent keys and action receipts
//! - The closed set of rate-limited action kinds
//!
//! **Design Principle**: Only include things that are "hard to change"
//! and have consistent meaning across all domains.

pub mod action_kind;
pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;

pub use action_kind::ActionKind;
