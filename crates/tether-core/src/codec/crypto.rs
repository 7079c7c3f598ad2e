//! Crypto strategies: how the bytes of a message are protected.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::error::{CodecError, CodecResult};

/// Optional encryption layer applied to every encoded payload.
///
/// Both directions are fallible; a failed decrypt stops decoding before the
/// marshal strategy ever sees the bytes.
pub trait Crypto: Send + Sync + fmt::Debug {
    /// Encrypts an encoded payload.
    fn encrypt(&self, data: Vec<u8>) -> CodecResult<Vec<u8>>;

    /// Decrypts a received payload.
    fn decrypt(&self, data: Vec<u8>) -> CodecResult<Vec<u8>>;
}

const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 AEAD.
///
/// Each payload is sealed under a fresh random nonce which is prefixed to
/// the ciphertext. Tampered payloads fail authentication on decrypt.
#[derive(Clone)]
pub struct ChaChaCrypto {
    cipher: ChaCha20Poly1305,
}

impl ChaChaCrypto {
    /// Creates a cipher from a 256-bit key.
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Generates a random 256-bit key.
    pub fn generate_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        chacha20poly1305::aead::rand_core::RngCore::fill_bytes(&mut OsRng, &mut key);
        key
    }
}

impl fmt::Debug for ChaChaCrypto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChaChaCrypto").finish_non_exhaustive()
    }
}

impl Crypto for ChaChaCrypto {
    fn encrypt(&self, data: Vec<u8>) -> CodecResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        chacha20poly1305::aead::rand_core::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, data.as_slice())
            .map_err(|_| CodecError::Encrypt("aead seal failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, data: Vec<u8>) -> CodecResult<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(CodecError::Decrypt(format!(
                "payload of {} bytes is shorter than the nonce",
                data.len()
            )));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CodecError::Decrypt("authentication failed".into()))
    }
}
