//! Agent Name Value Object
//!
//! The public handle an agent registers under. Unique across every key
//! ever issued, revoked ones included, so audit trails stay unambiguous.
//!
//! ## Rules
//! - NFKC normalized, trimmed, then lowercased (the canonical form)
//! - 3 to 50 characters
//! - Only `a-z`, `0-9`, `_`, `.`, `-`
//! - Starts and ends with an alphanumeric or `_`
//! - No consecutive dots
//! - At least one alphanumeric

use derive_more::Display;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Minimum length for agent name (in characters)
pub const AGENT_NAME_MIN_LENGTH: usize = 3;

/// Maximum length for agent name (in characters)
pub const AGENT_NAME_MAX_LENGTH: usize = 50;

const ALLOWED_SPECIAL_CHARS: &[char] = &['_', '.', '-'];

/// Error returned when agent name validation fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentNameError {
    #[error("Agent name cannot be empty")]
    Empty,

    #[error("Agent name is too short ({length} chars, minimum {min})")]
    TooShort { length: usize, min: usize },

    #[error("Agent name is too long ({length} chars, maximum {max})")]
    TooLong { length: usize, max: usize },

    #[error(
        "Invalid character '{char}' at position {position}. Only a-z, 0-9, _, ., - are allowed"
    )]
    InvalidCharacter { char: char, position: usize },

    #[error("Agent name cannot start with '{char}'. Must start with a-z, 0-9, or _")]
    InvalidStart { char: char },

    #[error("Agent name cannot end with '{char}'. Must end with a-z, 0-9, or _")]
    InvalidEnd { char: char },

    #[error("Agent name cannot contain consecutive dots (..)")]
    ConsecutiveDots,

    #[error("Agent name must contain at least one letter or digit")]
    NoAlphanumeric,
}

/// Validated, canonical agent name
#[derive(Clone, PartialEq, Eq, Hash, Display)]
#[display("{_0}")]
pub struct AgentName(String);

impl AgentName {
    /// Normalize and validate raw input
    pub fn parse(input: impl AsRef<str>) -> Result<Self, AgentNameError> {
        let canonical = Self::normalize(input.as_ref());
        Self::validate(&canonical)?;
        Ok(Self(canonical))
    }

    /// Create from database values (assumes already validated)
    pub fn from_db(canonical: impl Into<String>) -> Self {
        Self(canonical.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }

    fn normalize(input: &str) -> String {
        input.nfkc().collect::<String>().trim().to_lowercase()
    }

    fn validate(canonical: &str) -> Result<(), AgentNameError> {
        let (Some(first), Some(last)) = (canonical.chars().next(), canonical.chars().next_back())
        else {
            return Err(AgentNameError::Empty);
        };

        let length = canonical.chars().count();
        if length < AGENT_NAME_MIN_LENGTH {
            return Err(AgentNameError::TooShort {
                length,
                min: AGENT_NAME_MIN_LENGTH,
            });
        }
        if length > AGENT_NAME_MAX_LENGTH {
            return Err(AgentNameError::TooLong {
                length,
                max: AGENT_NAME_MAX_LENGTH,
            });
        }

        if let Some((position, char)) = canonical
            .chars()
            .enumerate()
            .find(|&(_, c)| !Self::is_valid_char(c))
        {
            return Err(AgentNameError::InvalidCharacter { char, position });
        }

        if !Self::is_valid_start_end_char(first) {
            return Err(AgentNameError::InvalidStart { char: first });
        }
        if !Self::is_valid_start_end_char(last) {
            return Err(AgentNameError::InvalidEnd { char: last });
        }

        if canonical.contains("..") {
            return Err(AgentNameError::ConsecutiveDots);
        }

        if !canonical.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(AgentNameError::NoAlphanumeric);
        }

        Ok(())
    }

    #[inline]
    fn is_valid_char(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || ALLOWED_SPECIAL_CHARS.contains(&c)
    }

    #[inline]
    fn is_valid_start_end_char(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
    }
}

impl fmt::Debug for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AgentName").field(&self.0).finish()
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
