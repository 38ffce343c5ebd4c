//! Agent Secret Value Object
//!
//! Bearer credential of the form `agt_<base36 ms timestamp>_<64 hex>`.
//! Only its SHA-256 is ever stored; the plaintext exists in memory for the
//! single response that hands it out, and is zeroized on drop.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Characters of the secret kept as a display hint
pub const KEY_HINT_LENGTH: usize = 8;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct AgentSecret(String);

impl AgentSecret {
    /// Fresh secret with `random_bytes` bytes of entropy
    pub fn generate(prefix: &str, random_bytes: usize, now_ms: i64) -> Self {
        let ts = to_base36(now_ms.max(0) as u64);
        let random = platform::crypto::random_hex(random_bytes);
        Self(format!("{prefix}_{ts}_{random}"))
    }

    /// Wrap a secret presented by a caller
    pub fn presented(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Lowercase hex SHA-256, the only persisted form
    pub fn hash(&self) -> String {
        platform::crypto::sha256_hex(self.0.as_bytes())
    }

    /// Short, non-secret hint for listings (`agt_lx3k...`)
    pub fn hint(&self) -> String {
        let head: String = self.0.chars().take(KEY_HINT_LENGTH).collect();
        format!("{head}...")
    }

    /// Plaintext, for the one response that returns it
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AgentSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AgentSecret").field(&"[REDACTED]").finish()
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
