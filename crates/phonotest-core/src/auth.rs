//! Shared-secret check for result downloads.
//!
//! Only the SHA-256 hex digest of the password is configured; a candidate
//! password is hashed and compared against it.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::AuthorizationError;

/// SHA-256 of `password` as 64 lowercase hex characters.
pub fn hash_secret(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// The configured download secret, held as a digest only.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret {
    digest: String,
}

impl SharedSecret {
    /// Accept a configured hex digest. Returns `None` if it is not 64 hex chars.
    pub fn from_digest(digest: &str) -> Option<Self> {
        let digest = digest.trim().to_ascii_lowercase();
        (digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit()))
            .then_some(Self { digest })
    }

    /// Hash a plaintext password into a secret (tests and `hash-secret`).
    pub fn from_password(password: &str) -> Self {
        Self {
            digest: hash_secret(password),
        }
    }

    /// Check a candidate password.
    pub fn verify(&self, candidate: &str) -> Result<(), AuthorizationError> {
        let calculated = hash_secret(candidate);
        // Compare every byte so timing does not depend on the match length.
        let diff = calculated
            .bytes()
            .zip(self.digest.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff == 0 && calculated.len() == self.digest.len() {
            Ok(())
        } else {
            Err(AuthorizationError)
        }
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("digest", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_secret("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn verify_accepts_only_matching_password() {
        let secret = SharedSecret::from_password("phoneme-lab");
        assert!(secret.verify("phoneme-lab").is_ok());
        assert!(secret.verify("phoneme-lab ").is_err());
        assert!(secret.verify("").is_err());
    }

    #[test]
    fn from_digest_normalizes_and_rejects_garbage() {
        let upper = hash_secret("x").to_uppercase();
        let secret = SharedSecret::from_digest(&upper).unwrap();
        assert!(secret.verify("x").is_ok());
        assert!(SharedSecret::from_digest("not-a-digest").is_none());
    }

    #[test]
    fn debug_masks_digest() {
        let secret = SharedSecret::from_password("x");
        assert!(!format!("{secret:?}").contains(&hash_secret("x")));
    }
}
