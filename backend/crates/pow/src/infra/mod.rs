//! Infrastructure Layer - Repository implementations

#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod postgres;
