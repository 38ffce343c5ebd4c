//! Client identification utilities
//!
//! Common functions for reading agent credentials from HTTP headers.

use axum::http::HeaderMap;

/// Header carrying the agent's bearer secret
pub const AGENT_KEY_HEADER: &str = "x-agent-key";

/// Header carrying a one-time action receipt
pub const AGENT_TOKEN_HEADER: &str = "x-agent-token";

/// Header carrying the operator token for admin routes
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Error when a required header is absent or unreadable
#[derive(Debug, Clone, thiserror::Error)]
pub enum HeaderError {
    #[error("Missing required header: {0}")]
    MissingHeader(String),
}

/// Read a non-empty, trimmed header value
pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Like [`header_value`], but missing headers are an error
pub fn require_header(headers: &HeaderMap, name: &str) -> Result<String, HeaderError> {
    header_value(headers, name).ok_or_else(|| HeaderError::MissingHeader(name.to_string()))
}

/// Extract the agent secret from `X-Agent-Key`, falling back to
/// `Authorization: Bearer <secret>`
pub fn extract_agent_secret(headers: &HeaderMap) -> Result<String, HeaderError> {
    if let Some(secret) = header_value(headers, AGENT_KEY_HEADER) {
        return Ok(secret);
    }
    header_value(headers, axum::http::header::AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer ").map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HeaderError::MissingHeader(AGENT_KEY_HEADER.to_string()))
}
