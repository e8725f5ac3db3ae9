// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! prefvault-security — cryptographic foundation for the preferences store.
//!
//! Provides the AEAD codec every stored value passes through, the secure key
//! facility that hands out non-exportable key handles, and the keychain
//! collaborators that hold key material between runs.

pub mod codec;
pub mod keychain;
pub mod keys;

pub use codec::EncryptionCodec;
pub use keychain::{FileKeychain, MemoryKeychain, SecretKeychain};
pub use keys::{KeyHandle, KeychainKeyFacility, SecureKeyFacility};
