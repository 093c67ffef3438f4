// Admin credential check for destructive requests

use sha2::{Digest, Sha256};

/// The configured admin key, held only as a SHA-256 digest.
///
/// The store never sees this type; the HTTP layer turns a presented key
/// into the `authorized` flag passed to `MessageStore::delete`.
#[derive(Clone, Default)]
pub struct AdminKey {
    digest: Option<[u8; 32]>,
}

impl AdminKey {
    /// No admin key configured; nothing is ever authorized.
    pub fn disabled() -> Self {
        Self { digest: None }
    }

    /// Admin key given in plain text.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            digest: Some(sha256(secret)),
        }
    }

    /// Admin key given as the hex SHA-256 digest of the secret.
    pub fn from_sha256_hex(hex_digest: &str) -> Result<Self, hex::FromHexError> {
        let mut digest = [0u8; 32];
        hex::decode_to_slice(hex_digest.trim(), &mut digest)?;
        Ok(Self {
            digest: Some(digest),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.digest.is_some()
    }

    /// Whether `candidate` matches the configured key.
    pub fn authorizes(&self, candidate: Option<&str>) -> bool {
        match (&self.digest, candidate) {
            (Some(expected), Some(candidate)) => {
                let actual = sha256(candidate);
                // Compare every byte so timing does not depend on the mismatch position
                expected
                    .iter()
                    .zip(actual.iter())
                    .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                    == 0
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminKey")
            .field("configured", &self.is_configured())
            .finish()
    }
}

fn sha256(input: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(input.as_bytes()));
    out
}
