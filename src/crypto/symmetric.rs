//! AES-256-GCM sealing and the HMAC-SHA256 key schedule.
//!
//! Ciphertexts are laid out as `nonce (12 bytes) || ciphertext || tag`.

use super::CryptoError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

pub const KEY_LENGTH: usize = 32;
pub const NONCE_LENGTH: usize = 12;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of `data` under `key`
pub fn derive_key(key: &[u8], data: &[u8]) -> Result<[u8; KEY_LENGTH], CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Encryption)?;

    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);

    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    let mut out = Vec::with_capacity(NONCE_LENGTH + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

pub fn decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < NONCE_LENGTH {
        return Err(CryptoError::Decryption);
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Decryption)?;
    let (nonce, sealed) = ciphertext.split_at(NONCE_LENGTH);

    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypts_what_it_encrypts() {
        let key = derive_key(b"chain key", b"nonce").unwrap();
        let ct = encrypt(&key, b"payload").unwrap();

        assert_eq!(ct.len(), NONCE_LENGTH + b"payload".len() + 16);
        assert_eq!(decrypt(&key, &ct).unwrap(), b"payload");
    }

    #[test]
    fn wrong_key_fails() {
        let ct = encrypt(&derive_key(b"a", b"n").unwrap(), b"payload").unwrap();
        assert_eq!(decrypt(&derive_key(b"b", b"n").unwrap(), &ct), Err(CryptoError::Decryption));
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let key = derive_key(b"a", b"n").unwrap();
        assert_eq!(decrypt(&key, &[0u8; 5]), Err(CryptoError::Decryption));

        let mut ct = encrypt(&key, b"payload").unwrap();
        ct.pop();
        assert_eq!(decrypt(&key, &ct), Err(CryptoError::Decryption));
    }

    #[test]
    fn key_schedule_is_deterministic() {
        assert_eq!(derive_key(b"k", b"x").unwrap(), derive_key(b"k", b"x").unwrap());
        assert_ne!(derive_key(b"k", b"x").unwrap(), derive_key(b"k", b"y").unwrap());
    }
}
