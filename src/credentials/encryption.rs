//! AES-256-GCM sealing for stored tokens.
//!
//! Every token is sealed with its own random nonce. The master key is a
//! base64-encoded 32-byte value supplied via the environment and held in
//! memory only.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Master key size in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// A sealed token: base64 ciphertext plus the base64 nonce it was sealed
/// with. Both columns are stored side by side in the link store.
#[derive(Clone, Debug)]
pub struct Sealed {
    pub ciphertext: String,
    pub nonce: String,
}

/// Decodes and validates the base64 master key.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key = BASE64
        .decode(key_base64)
        .context("Failed to decode base64 encryption key")?;

    if key.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {}",
            KEY_SIZE,
            key.len()
        ));
    }

    Ok(key)
}

/// Seals a token with a fresh random nonce.
pub fn seal(plaintext: &str, key: &[u8]) -> Result<Sealed> {
    let cipher = cipher_for(key)?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("Token encryption failed: {}", e))?;

    Ok(Sealed {
        ciphertext: BASE64.encode(&ciphertext),
        nonce: BASE64.encode(&nonce),
    })
}

/// Opens a sealed token. Fails on a wrong key, wrong nonce, or tampered
/// ciphertext (GCM is authenticated).
pub fn open(sealed: &Sealed, key: &[u8]) -> Result<String> {
    let cipher = cipher_for(key)?;

    let ciphertext = BASE64
        .decode(&sealed.ciphertext)
        .context("Failed to decode ciphertext")?;
    let nonce_bytes = BASE64.decode(&sealed.nonce).context("Failed to decode nonce")?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        ));
    }

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|e| anyhow!("Token decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext).context("Decrypted token is not valid UTF-8")
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))
}
