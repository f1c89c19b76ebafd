use rand::RngCore;
use sha2::{Digest, Sha256};

/// An opaque single-use token. The plaintext is mailed to the user and never
/// stored; only the digest is persisted and compared on the way back.
pub struct OneTimeToken {
    pub plain: String,
    pub hashed: String,
}

impl OneTimeToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let plain = hex::encode(bytes);
        let hashed = hash_token(&plain);
        Self { plain, hashed }
    }
}

/// Deterministic digest of a token handed back by a client, for lookup.
pub fn hash_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_is_32_random_bytes_hex_encoded() {
        let token = OneTimeToken::generate();
        assert_eq!(token.plain.len(), 64);
        assert!(token.plain.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_matches_a_rehash_of_the_plaintext() {
        let token = OneTimeToken::generate();
        assert_eq!(token.hashed, hash_token(&token.plain));
        assert_ne!(token.hashed, token.plain);
    }

    #[test]
    fn generation_never_repeats() {
        let first = OneTimeToken::generate();
        let second = OneTimeToken::generate();
        assert_ne!(first.plain, second.plain);
    }

    #[test]
    fn rehash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }
}
