use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

/// Hash a plaintext password with a fresh random salt. Called exactly at the
/// two boundaries that accept a plaintext password: register and reset.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("argon2 hash failed: {e}"))?;
    Ok(hash.to_string())
}

/// Compare a plaintext candidate against a stored digest. A mismatch is
/// `Ok(false)`; only a malformed stored digest is an error.
pub fn verify_password(plain: &str, digest: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(digest).map_err(|e| anyhow::anyhow!("malformed password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_digest_never_equals_the_plaintext() {
        let digest = hash_password("secret1").expect("hash");
        assert_ne!(digest, "secret1");
        assert!(verify_password("secret1", &digest).expect("verify"));
    }

    #[test]
    fn wrong_password_is_rejected_without_error() {
        let digest = hash_password("secret1").expect("hash");
        assert!(!verify_password("secret2", &digest).expect("verify"));
    }

    #[test]
    fn same_password_hashes_differently_each_time() {
        let first = hash_password("secret1").expect("hash");
        let second = hash_password("secret1").expect("hash");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_digest_is_an_error() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }
}
