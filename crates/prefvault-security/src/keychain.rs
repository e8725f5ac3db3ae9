// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secret keychain — where key material lives between runs.
//
// On a phone this is the platform keystore.  The implementations here are
// the desktop/CI stand-ins: an in-memory map for tests and a directory of
// owner-only files for the command-line front end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use prefvault_core::error::{PrefvaultError, Result};
use tracing::{debug, warn};

/// Secure key storage in the platform keychain / keystore.
pub trait SecretKeychain: Send + Sync {
    /// Store a secret under the given key, replacing any previous value.
    fn store_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret by key. Returns None if not found.
    fn load_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret by key. Deleting a missing secret is not an error.
    fn delete_secret(&self, key: &str) -> Result<()>;
}

/// Keychain that forgets everything when dropped.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKeychain {
    pub fn new() -> Self {
        Self::default()
    }

    fn secrets(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.secrets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SecretKeychain for MemoryKeychain {
    fn store_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        self.secrets().insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn load_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.secrets().get(key).cloned())
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        self.secrets().remove(key);
        Ok(())
    }
}

/// Keychain backed by one hex-encoded file per secret.
///
/// Not a substitute for a hardware keystore: anyone who can read the
/// directory can read the keys.  Files are created owner-only on Unix.
#[derive(Debug, Clone)]
pub struct FileKeychain {
    dir: PathBuf,
}

impl FileKeychain {
    /// Use (and create if needed) `dir` for secret files.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        debug!(path = %dir.display(), "file keychain opened");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(PrefvaultError::KeyFacility(format!(
                "invalid secret name {key:?}"
            )));
        }
        Ok(self.dir.join(format!("{key}.key")))
    }
}

impl SecretKeychain for FileKeychain {
    fn store_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        write_owner_only(&path, hex::encode(value).as_bytes())?;
        debug!(secret = key, "secret stored");
        Ok(())
    }

    fn load_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        let encoded = match std::fs::read_to_string(&path) {
            Ok(encoded) => encoded,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let secret = hex::decode(encoded.trim()).map_err(|e| {
            warn!(secret = key, error = %e, "keychain file is corrupt");
            PrefvaultError::KeyFacility(format!("secret {key:?} is corrupt: {e}"))
        })?;
        Ok(Some(secret))
    }

    fn delete_secret(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(keychain: &dyn SecretKeychain) {
        assert_eq!(keychain.load_secret("alias").unwrap(), None);

        keychain.store_secret("alias", &[1, 2, 3]).unwrap();
        assert_eq!(keychain.load_secret("alias").unwrap(), Some(vec![1, 2, 3]));

        keychain.store_secret("alias", &[9]).unwrap();
        assert_eq!(keychain.load_secret("alias").unwrap(), Some(vec![9]));

        keychain.delete_secret("alias").unwrap();
        assert_eq!(keychain.load_secret("alias").unwrap(), None);
        keychain.delete_secret("alias").unwrap();
    }

    #[test]
    fn memory_keychain() {
        exercise(&MemoryKeychain::new());
    }

    #[test]
    fn file_keychain() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileKeychain::open(dir.path().join("keys")).unwrap());
    }

    #[test]
    fn file_keychain_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        FileKeychain::open(dir.path())
            .unwrap()
            .store_secret("PrefvaultKey", b"key material")
            .unwrap();

        let reopened = FileKeychain::open(dir.path()).unwrap();
        assert_eq!(
            reopened.load_secret("PrefvaultKey").unwrap().as_deref(),
            Some(&b"key material"[..])
        );
    }

    #[test]
    fn file_keychain_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let keychain = FileKeychain::open(dir.path()).unwrap();
        assert!(keychain.store_secret("../escape", b"x").is_err());
        assert!(keychain.load_secret("").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn file_keychain_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let keychain = FileKeychain::open(dir.path()).unwrap();
        keychain.store_secret("k", b"x").unwrap();
        let mode = std::fs::metadata(dir.path().join("k.key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
