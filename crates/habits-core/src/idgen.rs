//! SHA256 + base36 habit ID generation.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use num_traits::Zero;
use sha2::{Digest, Sha256};

/// Prefix for generated habit IDs.
pub const HABIT_ID_PREFIX: &str = "hb";

/// Length of the base36 part of a habit ID.
pub const HABIT_ID_LENGTH: usize = 6;

/// Base36 alphabet (0-9, a-z).
const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Converts a byte slice to a base36 string of exactly `length` characters.
///
/// Short results are left-padded with zeros; long ones keep the least
/// significant digits.
pub fn encode_base36(data: &[u8], length: usize) -> String {
    let mut num = BigUint::from_bytes_be(data);
    let base = BigUint::from(36u32);

    let mut digits: Vec<u8> = Vec::with_capacity(length);
    while !num.is_zero() {
        let rem = (&num % &base).to_u32_digits();
        num /= &base;
        let idx = rem.first().copied().unwrap_or(0) as usize;
        digits.push(BASE36_ALPHABET[idx]);
    }
    while digits.len() < length {
        digits.push(b'0');
    }
    digits.truncate(length);
    digits.reverse();

    digits.into_iter().map(char::from).collect()
}

/// Creates a hash-based ID for a habit, e.g. `hb-0k3x9a`.
///
/// `nonce` lets callers retry on the rare collision.
pub fn generate_habit_id(
    user_id: &str,
    title: &str,
    timestamp: DateTime<Utc>,
    nonce: u32,
) -> String {
    let content = format!(
        "{}|{}|{}|{}",
        user_id,
        title,
        timestamp.timestamp_nanos_opt().unwrap_or(0),
        nonce
    );
    let hash = Sha256::digest(content.as_bytes());
    // 5 bytes = 40 bits, a little over 7 base36 digits.
    let short = encode_base36(&hash[..5], HABIT_ID_LENGTH);
    format!("{HABIT_ID_PREFIX}-{short}")
}
