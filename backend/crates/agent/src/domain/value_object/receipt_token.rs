//! Receipt Token Value Object
//!
//! One-time bearer token proving an action was authorized. Stored hashed,
//! like agent secrets.

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Random bytes per token (base64url-encoded on the wire)
const RECEIPT_TOKEN_BYTES: usize = 32;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ReceiptToken(String);

impl ReceiptToken {
    pub fn generate() -> Self {
        Self(platform::crypto::random_token(RECEIPT_TOKEN_BYTES))
    }

    pub fn presented(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn hash(&self) -> String {
        platform::crypto::sha256_hex(self.0.as_bytes())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ReceiptToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReceiptToken").field(&"[REDACTED]").finish()
    }
}
