//! Domain Value Objects

pub mod agent_name;
pub mod agent_secret;
pub mod receipt_token;

pub use agent_name::{AgentName, AgentNameError};
pub use agent_secret::AgentSecret;
pub use receipt_token::ReceiptToken;

/// Maximum description length (in characters)
pub const DESCRIPTION_MAX_LENGTH: usize = 500;

/// Trim a free-text description; blank becomes `None`
pub fn normalize_description(raw: Option<String>) -> Result<Option<String>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let length = trimmed.chars().count();
    if length > DESCRIPTION_MAX_LENGTH {
        return Err(format!(
            "description is too long ({length} chars, maximum {DESCRIPTION_MAX_LENGTH})"
        ));
    }
    if trimmed.chars().any(|c| c.is_control() && c != '\n') {
        return Err("description contains control characters".to_string());
    }
    Ok(Some(trimmed.to_string()))
}
