use crate::error::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;

pub const MASTER_KEY_LEN: usize = 32;

const ENVELOPE_VERSION: u8 = 0x01;
const NONCE_LEN: usize = 12;

/// AEAD envelope for secrets at rest.
///
/// Frame: `version(1) || nonce(12) || ciphertext+tag`, base64 encoded.
/// The nonce is uniformly random per call, so sealing the same plaintext
/// twice yields different ciphertexts; opening always restores the exact
/// plaintext when key and associated data match.
#[derive(Clone)]
pub struct Envelope {
    key: [u8; MASTER_KEY_LEN],
}

impl Envelope {
    pub fn new(key: [u8; MASTER_KEY_LEN]) -> Self {
        Self { key }
    }

    /// Build from a base64-encoded 32-byte master key.
    ///
    /// Generate one with: `openssl rand -base64 32`
    pub fn from_base64(key_b64: &str) -> Result<Self> {
        let key_bytes = STANDARD
            .decode(key_b64.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid base64: {}", e)))?;

        if key_bytes.len() != MASTER_KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "master key must be {} bytes, got {}",
                MASTER_KEY_LEN,
                key_bytes.len()
            )));
        }

        let mut key = [0u8; MASTER_KEY_LEN];
        key.copy_from_slice(&key_bytes);
        Ok(Self { key })
    }

    /// Encrypt `plaintext` bound to `associated_data`.
    pub fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|_| CryptoError::Integrity)?;

        let mut framed = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        framed.push(ENVELOPE_VERSION);
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(&framed))
    }

    /// Decrypt an envelope produced by [`seal`](Self::seal).
    pub fn open(&self, envelope: &str, associated_data: &[u8]) -> Result<Vec<u8>> {
        let framed = STANDARD
            .decode(envelope)
            .map_err(|e| CryptoError::Format(format!("invalid base64: {}", e)))?;

        // version byte + nonce + at least the 16-byte tag
        if framed.len() < 1 + NONCE_LEN + 16 {
            return Err(CryptoError::Format("envelope too short".to_string()));
        }
        if framed[0] != ENVELOPE_VERSION {
            return Err(CryptoError::Format(format!(
                "unsupported envelope version {}",
                framed[0]
            )));
        }

        let (nonce_bytes, ciphertext) = framed[1..].split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|_| CryptoError::Integrity)
    }

    /// Convenience for string secrets (DSNs, passwords, client secrets).
    pub fn seal_string(&self, plaintext: &str, associated_data: &str) -> Result<String> {
        self.seal(plaintext.as_bytes(), associated_data.as_bytes())
    }

    pub fn open_string(&self, envelope: &str, associated_data: &str) -> Result<String> {
        let plaintext = self.open(envelope, associated_data.as_bytes())?;
        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::Format("plaintext is not valid UTF-8".to_string()))
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("Envelope").finish_non_exhaustive()
    }
}
