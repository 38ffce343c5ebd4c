//! Domain Services
//!
//! Pure domain logic for PoW hashing, verification and mining.

use crate::domain::value_objects::Difficulty;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};

/// How often the miner looks at the cancel flag
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Count leading zero hex digits (nibbles) in a SHA-256 hash
pub fn count_leading_zero_nibbles(hash: &[u8; 32]) -> u8 {
    let mut count = 0u8;
    for &byte in hash {
        if byte == 0 {
            count += 2;
        } else {
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
    }
    count
}

/// Verify that a hash meets the difficulty requirement
///
/// Equivalent to the lowercase hex digest starting with `difficulty` '0's.
pub fn meets_difficulty(hash: &[u8; 32], difficulty: Difficulty) -> bool {
    count_leading_zero_nibbles(hash) >= difficulty.digits()
}

/// Compute SHA-256 of the prefix followed by the nonce, both as UTF-8
pub fn compute_pow_hash(prefix: &str, nonce: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.finalize().into()
}

/// Verify a PoW solution
pub fn verify_pow(prefix: &str, nonce: &str, difficulty: Difficulty) -> bool {
    meets_difficulty(&compute_pow_hash(prefix, nonce), difficulty)
}

/// Outcome of a bounded brute-force search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MineOutcome {
    Found { nonce: String, attempts: u64 },
    Exhausted { attempts: u64 },
    Cancelled { attempts: u64 },
}

/// Search decimal nonces `0, 1, 2, ...` for a solution
///
/// Stops after `max_attempts` hashes or as soon as `cancel` is set.
pub fn mine(
    prefix: &str,
    difficulty: Difficulty,
    max_attempts: u64,
    cancel: &AtomicBool,
) -> MineOutcome {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());

    for attempt in 0..max_attempts {
        if attempt % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            return MineOutcome::Cancelled { attempts: attempt };
        }
        let nonce = attempt.to_string();
        let mut h = hasher.clone();
        h.update(nonce.as_bytes());
        let hash: [u8; 32] = h.finalize().into();
        if meets_difficulty(&hash, difficulty) {
            return MineOutcome::Found {
                nonce,
                attempts: attempt + 1,
            };
        }
    }
    MineOutcome::Exhausted {
        attempts: max_attempts,
    }
}
