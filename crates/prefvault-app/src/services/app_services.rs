// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — initialises the key facility and the configuration
// store and hands the front end one cloneable `ConfigService`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use prefvault_core::AppSettings;
use prefvault_core::clock::{Clock, SystemClock};
use prefvault_core::error::Result;
use prefvault_security::{EncryptionCodec, FileKeychain, KeychainKeyFacility, SecureKeyFacility};
use prefvault_store::{ConfigService, ConfigurationStore, SqliteKvStore};
use tracing::info;

/// Shared application services.
///
/// Cheap to clone; every clone talks to the same store.
#[derive(Clone)]
pub struct AppServices {
    config: ConfigService,
    data_dir: PathBuf,
    settings: AppSettings,
}

impl AppServices {
    /// Initialise all services.  Call once at startup.
    ///
    /// Opens (or creates) the keychain directory and the preferences
    /// database inside `data_dir` and fetches the device key.
    pub fn init(data_dir: &Path, settings: AppSettings) -> Result<Self> {
        Self::init_with_clock(data_dir, settings, Arc::new(SystemClock))
    }

    pub fn init_with_clock(
        data_dir: &Path,
        settings: AppSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        info!(path = %data_dir.display(), "initialising app services");

        let keychain = FileKeychain::open(data_dir.join(&settings.keychain_dir))?;
        let key = KeychainKeyFacility::new(keychain).get_or_create_key(&settings.key_alias)?;

        let backend = SqliteKvStore::open(data_dir.join(&settings.database_file))?;
        let store = ConfigurationStore::new(Box::new(backend), EncryptionCodec::new(key), clock);

        info!("app services initialised");
        Ok(Self {
            config: ConfigService::new(store),
            data_dir: data_dir.to_path_buf(),
            settings,
        })
    }

    pub fn config(&self) -> &ConfigService {
        &self.config
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Path to the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
