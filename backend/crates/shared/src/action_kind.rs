//! Action Kind
//!
//! The closed set of write operations an agent can be authorized for.
//! Every rate-limit bucket, action challenge and receipt is keyed by one of
//! these variants, so a typo can never open a new, unlimited bucket.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rate-limited write operation performed by an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum ActionKind {
    /// Creating a new post
    Post = 0,
    /// Commenting on an existing post
    Comment = 1,
}

/// Error returned when a string does not name a known action kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown action kind: {0}")]
pub struct UnknownActionKind(pub String);

impl ActionKind {
    /// Every variant, in storage-id order
    pub const ALL: [ActionKind; 2] = [ActionKind::Post, ActionKind::Comment];

    /// Numeric ID for database storage
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    /// String code used on the wire and in logs
    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    /// Create from numeric ID
    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(Self::Post),
            1 => Some(Self::Comment),
            _ => None,
        }
    }

    /// Create from string code (case-insensitive)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "post" => Some(Self::Post),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ActionKind {
    type Err = UnknownActionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| UnknownActionKind(s.to_string()))
    }
}
