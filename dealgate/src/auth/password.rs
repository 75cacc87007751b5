//! Password hashing and verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::errors::Error;

/// Argon2id work factor. Higher costs slow down both legitimate logins and
/// offline cracking; the defaults follow the RFC 9106 low-memory profile.
#[derive(Debug, Clone, Copy)]
pub struct HashingCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingCost {
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// One-way password hasher.
///
/// `hash` salts every call with fresh randomness, so two hashes of the same
/// input never compare equal; all parameters needed for verification are
/// embedded in the PHC digest string. Stateless and cheap to clone, safe to
/// use from any number of tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hasher {
    cost: HashingCost,
}

impl Hasher {
    pub fn new(cost: HashingCost) -> Self {
        Self { cost }
    }

    fn argon2(&self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.cost.memory_kib, self.cost.iterations, self.cost.parallelism, None).map_err(|e| {
            Error::Internal {
                operation: format!("create argon2 params: {e}"),
            }
        })?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a plaintext password into a PHC-format digest string.
    pub fn hash(&self, plaintext: &str) -> Result<String, Error> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self.argon2()?.hash_password(plaintext.as_bytes(), &salt).map_err(|e| Error::Internal {
            operation: format!("hash password: {e}"),
        })?;
        Ok(digest.to_string())
    }

    /// Verify a plaintext password against a stored digest.
    ///
    /// A wrong password is `Ok(false)`, not an error; a digest that cannot
    /// be parsed is an internal error since we only ever store digests this
    /// module produced. Verification uses the parameters embedded in the
    /// digest itself.
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, Error> {
        let parsed = PasswordHash::new(digest).map_err(|e| Error::Internal {
            operation: format!("parse password digest: {e}"),
        })?;
        Ok(Argon2::default().verify_password(plaintext.as_bytes(), &parsed).is_ok())
    }
}

#[cfg(test)]
pub(crate) fn fast_hasher() -> Hasher {
    // Keeps the test suite off the production work factor
    Hasher::new(HashingCost {
        memory_kib: 8192,
        iterations: 1,
        parallelism: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify_roundtrip() {
        let hasher = fast_hasher();
        let digest = hasher.hash("test_password_123").unwrap();

        assert!(!digest.is_empty());
        assert!(hasher.verify("test_password_123", &digest).unwrap());
        assert!(!hasher.verify("wrong_password", &digest).unwrap());
    }

    #[test]
    fn test_same_input_different_digests() {
        let hasher = fast_hasher();

        let first = hasher.hash("same_password").unwrap();
        let second = hasher.hash("same_password").unwrap();

        // Salted per call, so digests differ but both verify
        assert_ne!(first, second);
        assert!(hasher.verify("same_password", &first).unwrap());
        assert!(hasher.verify("same_password", &second).unwrap());
    }

    #[test]
    fn test_malformed_digest_is_an_error_not_a_mismatch() {
        let hasher = fast_hasher();

        let result = hasher.verify("anything", "not-a-phc-string");
        assert!(matches!(result, Err(Error::Internal { .. })));
    }
}
