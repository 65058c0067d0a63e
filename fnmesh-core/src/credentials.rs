//! AES-GCM encryption for at-rest secrets (spec §6: docker-login
//! credentials, "encrypted at rest under a process key"). The key and
//! nonce are generated once per process and never persisted — restarting
//! the server invalidates any previously stored credential, which matches
//! the in-memory Non-goal on persistent storage format.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoError(pub String);

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "credential crypto error: {}", self.0)
    }
}

impl std::error::Error for CryptoError {}

/// One process-wide AES-256-GCM key, generated at startup.
pub struct CredentialKey {
    cipher: Aes256Gcm,
}

impl CredentialKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        CredentialKey { cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&bytes)) }
    }

    /// Encrypts `plaintext`, returning `nonce || ciphertext` for storage as
    /// one opaque blob under the datastore's extras key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self.cipher.encrypt(nonce, plaintext).map_err(|e| CryptoError(e.to_string()))?;
        let mut out = nonce_bytes.to_vec();
        out.extend(ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < 12 {
            return Err(CryptoError("ciphertext shorter than nonce".into()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher.decrypt(nonce, ciphertext).map_err(|e| CryptoError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = CredentialKey::generate();
        let blob = key.encrypt(b"{\"auth\":\"dXNlcjpwYXNz\"}").unwrap();
        let plain = key.decrypt(&blob).unwrap();
        assert_eq!(plain, b"{\"auth\":\"dXNlcjpwYXNz\"}");
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let key = CredentialKey::generate();
        let mut blob = key.encrypt(b"secret").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(key.decrypt(&blob).is_err());
    }

    #[test]
    fn each_encryption_uses_a_fresh_nonce() {
        let key = CredentialKey::generate();
        let a = key.encrypt(b"secret").unwrap();
        let b = key.encrypt(b"secret").unwrap();
        assert_ne!(&a[..12], &b[..12]);
    }
}
