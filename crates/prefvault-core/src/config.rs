// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Name of the settings file inside the data directory.
pub const SETTINGS_FILE: &str = "prefvault.json";

/// Deployment settings for the preferences store. These are not user
/// preferences; they describe where and how the store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Alias of the AEAD key in the secure key facility.
    pub key_alias: String,
    /// SQLite file holding the encrypted preferences, relative to the data dir.
    pub database_file: String,
    /// Directory holding keychain secrets, relative to the data dir.
    pub keychain_dir: String,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            key_alias: "PrefvaultKey".into(),
            database_file: "preferences.db".into(),
            keychain_dir: "keys".into(),
            log_filter: "info".into(),
        }
    }
}

impl AppSettings {
    /// Read `prefvault.json` from `data_dir`.
    ///
    /// Returns `Ok(None)` when the file does not exist; unknown fields are
    /// ignored and missing ones take their defaults.
    pub fn load_from_dir(data_dir: &Path) -> crate::error::Result<Option<Self>> {
        let path = data_dir.join(SETTINGS_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&data)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"key_alias":"other"}"#).unwrap();
        assert_eq!(settings.key_alias, "other");
        assert_eq!(settings.database_file, "preferences.db");
        assert_eq!(settings.log_filter, "info");
    }

    #[test]
    fn missing_file_is_none() {
        let dir = std::env::temp_dir().join("prefvault-settings-missing-test");
        assert!(AppSettings::load_from_dir(&dir).unwrap().is_none());
    }
}
