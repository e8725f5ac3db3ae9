// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secure key facility — hands out AEAD key handles by alias, generating the
// key on first use.

use std::sync::{Arc, Mutex};

use prefvault_core::error::{PrefvaultError, Result};
use ring::aead::{AES_256_GCM, LessSafeKey, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{info, instrument};

use crate::keychain::SecretKeychain;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// An AEAD-capable key that never gives its bytes back.
///
/// Obtained once at start-up and injected wherever encryption happens.
/// Cloning shares the same key.
#[derive(Clone)]
pub struct KeyHandle {
    alias: Arc<str>,
    key: Arc<LessSafeKey>,
}

impl KeyHandle {
    fn from_bytes(alias: &str, bytes: &[u8]) -> Result<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, bytes).map_err(|_| {
            PrefvaultError::KeyFacility(format!(
                "key {alias:?} has {} bytes, expected {KEY_LEN}",
                bytes.len()
            ))
        })?;
        Ok(Self {
            alias: Arc::from(alias),
            key: Arc::new(LessSafeKey::new(unbound)),
        })
    }

    pub(crate) fn aead(&self) -> &LessSafeKey {
        &self.key
    }
}

impl std::fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle")
            .field("alias", &self.alias)
            .field("algorithm", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}

/// Platform facility that owns device-resident keys.
pub trait SecureKeyFacility: Send + Sync {
    /// Return the key stored under `alias`, creating it if absent.
    fn get_or_create_key(&self, alias: &str) -> Result<KeyHandle>;
}

/// Key facility that keeps raw key material in a [`SecretKeychain`].
pub struct KeychainKeyFacility<K> {
    keychain: K,
    rng: SystemRandom,
    /// Serializes generate-if-absent so two first callers agree on one key.
    creation: Mutex<()>,
}

impl<K: SecretKeychain> KeychainKeyFacility<K> {
    pub fn new(keychain: K) -> Self {
        Self {
            keychain,
            rng: SystemRandom::new(),
            creation: Mutex::new(()),
        }
    }
}

impl<K: SecretKeychain> SecureKeyFacility for KeychainKeyFacility<K> {
    #[instrument(skip(self))]
    fn get_or_create_key(&self, alias: &str) -> Result<KeyHandle> {
        let _guard = self
            .creation
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(bytes) = self.keychain.load_secret(alias)? {
            return KeyHandle::from_bytes(alias, &bytes);
        }

        let mut bytes = [0u8; KEY_LEN];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| PrefvaultError::KeyFacility("system RNG unavailable".into()))?;
        self.keychain.store_secret(alias, &bytes)?;
        let handle = KeyHandle::from_bytes(alias, &bytes);
        bytes.fill(0);

        info!("generated new device key");
        handle
    }
}
