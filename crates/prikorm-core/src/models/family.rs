//! Family scope code helpers

use uuid::Uuid;

use crate::error::{Error, Result};

/// Length of generated family codes.
pub const FAMILY_CODE_LEN: usize = 6;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a new random family code (upper-case base 36).
pub fn generate_family_code() -> String {
    // The low 62 bits of a v7 UUID are random.
    let mut seed = Uuid::now_v7().as_u128() & ((1u128 << 62) - 1);
    let mut code = String::with_capacity(FAMILY_CODE_LEN);
    for _ in 0..FAMILY_CODE_LEN {
        let digit = usize::try_from(seed % 36).unwrap_or_default();
        code.push(char::from(ALPHABET[digit]));
        seed /= 36;
    }
    code
}

/// Normalize a user-entered family code.
pub fn normalize_family_code(raw: &str) -> Result<String> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(Error::InvalidInput(
            "family code must not be empty".to_string(),
        ));
    }
    if code.chars().any(char::is_whitespace) {
        return Err(Error::InvalidInput(
            "family code must not contain whitespace".to_string(),
        ));
    }
    Ok(code)
}
