// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Encryption codec — AES-256-GCM (ring) for sealing and opening short text
// values.  Each value is packed into one lowercase-hex transport string:
//
//   hex( nonce[12] || ciphertext || tag[16] )
//
// The nonce is drawn fresh from the system RNG for every call.

use prefvault_core::error::{PrefvaultError, Result};
use ring::aead::{Aad, NONCE_LEN, Nonce};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};

use crate::keys::KeyHandle;

/// Length of the AES-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Shortest decodable blob: a nonce and a tag around an empty plaintext.
pub const MIN_BLOB_LEN: usize = NONCE_LEN + TAG_LEN;

/// Stateless AEAD codec around an injected key handle.
///
/// Cloning is cheap; clones share the key.
#[derive(Clone)]
pub struct EncryptionCodec {
    key: KeyHandle,
    rng: SystemRandom,
}

impl EncryptionCodec {
    pub fn new(key: KeyHandle) -> Self {
        Self {
            key,
            rng: SystemRandom::new(),
        }
    }

    /// Encrypt `plaintext` into a transport string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.encrypt_bound("", plaintext)
    }

    /// Decrypt a transport string produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, blob: &str) -> Result<String> {
        self.decrypt_bound("", blob)
    }

    /// Encrypt `plaintext`, authenticating `context` as associated data.
    ///
    /// The blob only opens again under the same context, so a value copied
    /// to a different storage key is rejected.
    #[instrument(skip_all, fields(%context, plaintext_len = plaintext.len()))]
    pub fn encrypt_bound(&self, context: &str, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| PrefvaultError::Encryption("system RNG unavailable".into()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .aead()
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(context.as_bytes()),
                &mut in_out,
            )
            .map_err(|_| PrefvaultError::Encryption("AES-GCM seal failed".into()))?;

        let mut packed = Vec::with_capacity(NONCE_LEN + in_out.len());
        packed.extend_from_slice(&nonce_bytes);
        packed.extend_from_slice(&in_out);

        debug!(blob_len = packed.len(), "encryption complete");
        Ok(hex::encode(packed))
    }

    /// Decrypt a blob produced by [`encrypt_bound`](Self::encrypt_bound)
    /// with the same `context`.
    #[instrument(skip_all, fields(%context, blob_len = blob.len()))]
    pub fn decrypt_bound(&self, context: &str, blob: &str) -> Result<String> {
        // hex::decode accepts upper case too; refusing it keeps the encoding
        // canonical so that no bit flip of the transport string decodes to
        // the same bytes.
        if !blob.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(PrefvaultError::Decryption("malformed blob encoding".into()));
        }
        let mut packed = hex::decode(blob)
            .map_err(|e| PrefvaultError::Decryption(format!("malformed blob: {e}")))?;

        if packed.len() < MIN_BLOB_LEN {
            return Err(PrefvaultError::Decryption(format!(
                "blob truncated: {} bytes, need at least {MIN_BLOB_LEN}",
                packed.len()
            )));
        }

        let (nonce_bytes, sealed) = packed.split_at_mut(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| PrefvaultError::Decryption("bad nonce length".into()))?;

        let plaintext = self
            .key
            .aead()
            .open_in_place(nonce, Aad::from(context.as_bytes()), sealed)
            .map_err(|_| PrefvaultError::Decryption("integrity check failed".into()))?;

        let text = std::str::from_utf8(plaintext)
            .map_err(|e| PrefvaultError::Decryption(format!("plaintext is not UTF-8: {e}")))?
            .to_owned();

        debug!(plaintext_len = text.len(), "decryption complete");
        Ok(text)
    }
}

impl std::fmt::Debug for EncryptionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionCodec")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::keychain::MemoryKeychain;
    use crate::keys::{KeychainKeyFacility, SecureKeyFacility};

    fn codec(alias: &str) -> EncryptionCodec {
        let facility = KeychainKeyFacility::new(MemoryKeychain::new());
        EncryptionCodec::new(facility.get_or_create_key(alias).expect("key"))
    }

    #[test]
    fn round_trip() {
        let codec = codec("test");
        let serialized = r#"{"userName":"Ana","themeDark":true,"preferredLanguage":"fr"}"#;

        let blob = codec.encrypt(serialized).expect("encrypt failed");
        assert!(!blob.contains("Ana"), "blob must not leak plaintext");

        let decrypted = codec.decrypt(&blob).expect("decrypt failed");
        assert_eq!(decrypted, serialized);
    }

    #[test]
    fn empty_plaintext() {
        let codec = codec("empty");
        let blob = codec.encrypt("").expect("encrypt failed");
        assert_eq!(blob.len(), MIN_BLOB_LEN * 2);
        assert_eq!(codec.decrypt(&blob).expect("decrypt failed"), "");
    }

    #[test]
    fn every_bit_flip_is_detected() {
        let codec = codec("tamper");
        let blob = codec.encrypt("42").expect("encrypt failed");

        for i in 0..blob.len() {
            for bit in 0..8 {
                let mut tampered = blob.clone().into_bytes();
                tampered[i] ^= 1 << bit;
                // A flipped high bit is not UTF-8; the lossy copy is still not hex.
                let tampered = String::from_utf8_lossy(&tampered).into_owned();
                match codec.decrypt(&tampered) {
                    Err(PrefvaultError::Decryption(_)) => {}
                    other => panic!("flip of bit {bit} in char {i} not detected: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn nonces_never_repeat() {
        let codec = codec("nonce");
        let blobs: HashSet<String> = (0..10_000)
            .map(|_| codec.encrypt("same plaintext").expect("encrypt failed"))
            .collect();
        assert_eq!(blobs.len(), 10_000);
    }

    #[test]
    fn truncated_blob_rejected() {
        let codec = codec("short");
        let blob = codec.encrypt("hello").expect("encrypt failed");
        let short = &blob[..(MIN_BLOB_LEN - 1) * 2];
        let err = codec.decrypt(short).unwrap_err();
        assert!(err.to_string().contains("truncated"), "{err}");
    }

    #[test]
    fn malformed_encoding_rejected() {
        let codec = codec("malformed");
        assert!(matches!(
            codec.decrypt("not hex at all"),
            Err(PrefvaultError::Decryption(_))
        ));
        assert!(matches!(codec.decrypt("abc"), Err(PrefvaultError::Decryption(_))));
    }

    #[test]
    fn wrong_key_fails() {
        let a = codec("alpha");
        let b = codec("beta");
        let blob = a.encrypt("secret").expect("encrypt failed");
        assert!(b.decrypt(&blob).is_err(), "decryption with wrong key must fail");
    }

    #[test]
    fn context_is_authenticated() {
        let codec = codec("bound");
        let blob = codec
            .encrypt_bound("notification_volume", "100")
            .expect("encrypt failed");
        assert_eq!(
            codec.decrypt_bound("notification_volume", &blob).unwrap(),
            "100"
        );
        assert!(codec.decrypt_bound("total_usage_time_seconds", &blob).is_err());
        assert!(codec.decrypt(&blob).is_err());
    }

    #[test]
    fn concurrent_encrypts_stay_distinct() {
        let codec = codec("threads");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let codec = codec.clone();
                std::thread::spawn(move || {
                    (0..500)
                        .map(|_| codec.encrypt("x").expect("encrypt failed"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all = HashSet::new();
        for handle in handles {
            all.extend(handle.join().expect("thread panicked"));
        }
        assert_eq!(all.len(), 2_000);
    }
}
