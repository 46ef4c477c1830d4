/// Random secrets
///
/// Everything here draws from the operating system CSPRNG.

use rand::rngs::OsRng;
use rand::{Rng, RngCore};

/// Bytes of entropy in access and refresh tokens
pub const TOKEN_BYTES: usize = 32;

/// Characters in a verification code id
pub const CODE_ID_LEN: usize = 26;

/// Digits in a verification code
pub const CODE_DIGITS: usize = 6;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Opaque session token, hex encoded (64 characters)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Six-digit verification code, zero padded
pub fn generate_code() -> String {
    let code: u32 = OsRng.gen_range(0..1_000_000);
    format!("{code:06}")
}

/// Identifier under which a verification code is stored
///
/// 26 base32 characters carry 130 bits and are unrelated to the code.
pub fn generate_code_id() -> String {
    (0..CODE_ID_LEN)
        .map(|_| BASE32_ALPHABET[OsRng.gen_range(0..BASE32_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_code_is_six_digits() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_DIGITS);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_code_id_alphabet() {
        let ids: HashSet<String> = (0..100).map(|_| generate_code_id()).collect();
        assert_eq!(ids.len(), 100);

        for id in ids {
            assert_eq!(id.len(), CODE_ID_LEN);
            assert!(id.bytes().all(|b| BASE32_ALPHABET.contains(&b)));
        }
    }
}
