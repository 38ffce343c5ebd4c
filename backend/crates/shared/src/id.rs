//! Common ID Types
//!
//! Type-safe ID wrappers for the agent trust entities.

use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

/// Generic typed ID wrapper
///
/// Usage:
/// ```
/// use kernel::id::{Id, markers};
/// type AgentKeyId = Id<markers::AgentKey>;
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id<T> {
    value: uuid::Uuid,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    /// Create a new random ID (UUID v4)
    pub fn new() -> Self {
        Self {
            value: Uuid::new_v4(),
            _marker: PhantomData,
        }
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self {
            value: uuid,
            _marker: PhantomData,
        }
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.value
    }

    pub fn into_uuid(self) -> Uuid {
        self.value
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> From<Uuid> for Id<T> {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl<T> From<Id<T>> for Uuid {
    fn from(id: Id<T>) -> Self {
        id.value
    }
}

/// Marker types for different entity IDs
pub mod markers {
    /// Marker for proof-of-work challenge IDs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Challenge;

    /// Marker for agent key (capability identity) IDs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AgentKey;

    /// Marker for one-time action receipt IDs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ActionReceipt;
}

pub type ChallengeId = Id<markers::Challenge>;
pub type AgentKeyId = Id<markers::AgentKey>;
pub type ActionReceiptId = Id<markers::ActionReceipt>;
