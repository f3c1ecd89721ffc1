//! Secret envelope (C4): seal/unseal per-graph secret values.
//!
//! AES-256-GCM with a random 96-bit nonce prepended to ciphertext+tag, the
//! whole thing base64url-encoded (no padding). The encryption key comes
//! from `SECRETS_ENCRYPTION_KEY` (§6.3): base64url for 32 raw bytes.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::EngineError;

const NONCE_LEN: usize = 12;
const MIN_SEALED_LEN: usize = 32;

/// Parse `SECRETS_ENCRYPTION_KEY` into the 32-byte key `aes-gcm` expects.
pub fn parse_key(base64url_key: &str) -> Result<[u8; 32], EngineError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(base64url_key)
        .map_err(|e| EngineError::Secret(format!("encryption key is not valid base64url: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| EngineError::Secret("encryption key must decode to exactly 32 bytes".into()))
}

/// Seal `plaintext`, returning the base64url envelope.
pub fn seal(key: &[u8; 32], plaintext: &str) -> Result<String, EngineError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| EngineError::Secret(format!("seal failed: {e}")))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);

    Ok(URL_SAFE_NO_PAD.encode(envelope))
}

/// Unseal a base64url envelope produced by [`seal`]. Any tampering with
/// the ciphertext, tag, or nonce fails authentication and returns an error.
pub fn unseal(key: &[u8; 32], sealed: &str) -> Result<String, EngineError> {
    validate(sealed)?;

    let raw = URL_SAFE_NO_PAD
        .decode(sealed)
        .map_err(|e| EngineError::Secret(format!("sealed value is not valid base64url: {e}")))?;

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| EngineError::Secret(format!("unseal failed: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| EngineError::Secret(format!("unsealed value is not valid UTF-8: {e}")))
}

/// Structural validation only — does not require the key, so this can gate
/// malformed input before attempting a (potentially expensive) decrypt.
pub fn validate(sealed: &str) -> Result<(), EngineError> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(EngineError::Secret(
            "sealed value is shorter than the minimum envelope length".into(),
        ));
    }
    let raw = URL_SAFE_NO_PAD
        .decode(sealed)
        .map_err(|e| EngineError::Secret(format!("sealed value is not valid base64url: {e}")))?;
    if raw.len() < NONCE_LEN {
        return Err(EngineError::Secret(
            "sealed value decodes to fewer bytes than a nonce".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        [7u8; 32]
    }

    #[test]
    fn round_trips_arbitrary_utf8() {
        let key = test_key();
        let sealed = seal(&key, "s3cr3t-\u{1F600}").unwrap();
        let plain = unseal(&key, &sealed).unwrap();
        assert_eq!(plain, "s3cr3t-\u{1F600}");
    }

    #[test]
    fn unseal_fails_with_wrong_key() {
        let key = test_key();
        let other_key = [9u8; 32];
        let sealed = seal(&key, "s3cr3t").unwrap();
        assert!(unseal(&other_key, &sealed).is_err());
    }

    #[test]
    fn unseal_fails_when_tampered() {
        let key = test_key();
        let sealed = seal(&key, "s3cr3t").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        assert!(unseal(&key, &tampered).is_err());
    }

    #[test]
    fn validate_rejects_short_strings() {
        assert!(validate("short").is_err());
    }
}
