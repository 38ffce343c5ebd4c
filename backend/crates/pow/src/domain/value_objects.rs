//! Domain Value Objects
//!
//! Immutable value types for the PoW domain.

use crate::error::{PowError, PowResult};
use kernel::ActionKind;
use kernel::id::AgentKeyId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a challenge gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    #[serde(alias = "register")]
    Registration,
    Action,
}

impl ChallengeKind {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Action => "action",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "registration" | "register" => Some(Self::Registration),
            "action" => Some(Self::Action),
            _ => None,
        }
    }
}

impl fmt::Display for ChallengeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Who a challenge may be redeemed by, and for what
///
/// Action challenges carry the agent key and action kind they were issued
/// for; the variant makes it impossible to build an action challenge
/// without both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeScope {
    Registration,
    Action {
        agent_key_id: AgentKeyId,
        action_kind: ActionKind,
    },
}

impl ChallengeScope {
    pub fn action(agent_key_id: AgentKeyId, action_kind: ActionKind) -> Self {
        Self::Action {
            agent_key_id,
            action_kind,
        }
    }

    pub fn kind(&self) -> ChallengeKind {
        match self {
            Self::Registration => ChallengeKind::Registration,
            Self::Action { .. } => ChallengeKind::Action,
        }
    }

    pub fn agent_key_id(&self) -> Option<AgentKeyId> {
        match self {
            Self::Registration => None,
            Self::Action { agent_key_id, .. } => Some(*agent_key_id),
        }
    }

    pub fn action_kind(&self) -> Option<ActionKind> {
        match self {
            Self::Registration => None,
            Self::Action { action_kind, .. } => Some(*action_kind),
        }
    }
}

/// Difficulty level for PoW, in leading zero hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Difficulty(u8);

impl Difficulty {
    pub const MIN: u8 = 1;
    /// A SHA-256 digest has 64 hex digits
    pub const MAX: u8 = 64;

    pub fn new(digits: u8) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&digits) {
            Some(Self(digits))
        } else {
            None
        }
    }

    /// Clamp into `MIN..=MAX`; for constants and operator overrides
    pub const fn clamped(digits: u8) -> Self {
        if digits < Self::MIN {
            Self(Self::MIN)
        } else if digits > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(digits)
        }
    }

    pub fn digits(&self) -> u8 {
        self.0
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Random per-challenge prefix, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix(String);

impl Prefix {
    /// Fresh prefix from `bytes` bytes of OS randomness
    pub fn generate(bytes: usize) -> Self {
        Self(platform::crypto::random_hex(bytes))
    }

    /// Rehydrate a stored prefix
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied nonce
///
/// Validated before any hashing happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    pub const MAX_LEN: usize = 128;

    pub fn parse(raw: &str) -> PowResult<Self> {
        if raw.is_empty() {
            return Err(PowError::Validation("nonce must not be empty".into()));
        }
        if raw.len() > Self::MAX_LEN {
            return Err(PowError::Validation(format!(
                "nonce must be at most {} characters",
                Self::MAX_LEN
            )));
        }
        if !raw.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(PowError::Validation(
                "nonce must be printable ASCII without whitespace".into(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
