use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

// Login/OTP flows live in the main platform; this service only validates the
// opaque session tokens it issues. Token minting is kept for bin/mktoken.

/// Generate an opaque session token to hand to a client.
/// We store only a hash(token) in DB for safety.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash token for DB storage (SHA-256 hex).
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_is_stable_hex() {
        let h1 = hash_access_token("abc");
        let h2 = hash_access_token("abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_tokens_differ() {
        assert_ne!(generate_access_token(), generate_access_token());
    }
}
