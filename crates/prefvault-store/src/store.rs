// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration store — the single owner of the persisted `UserConfiguration`.
//
// Layout: one key per field, each value encrypted with the field's key name
// as associated data:
//
//   user_name                 text (trimmed)
//   dark_theme_enabled        "true" / "false"
//   preferred_language        ISO 639-1 code
//   notification_volume       0..=100
//   last_access_time          epoch milliseconds
//   last_location_latitude    degrees   (absent together with longitude)
//   last_location_longitude   degrees
//   total_usage_time_seconds  seconds
//
// Every mutation runs under one mutex against the in-process cached copy and
// commits all keys in one batch, so updates never interleave and readers
// never see half a record.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use prefvault_core::clock::Clock;
use prefvault_core::error::{PrefvaultError, Result, ValidationError};
use prefvault_core::types::{ConfigSnapshot, GeoLocation, Language, UserConfiguration};
use prefvault_security::EncryptionCodec;
use tracing::{debug, error, info, instrument, warn};

use crate::kv::KeyValueStore;

pub const KEY_USER_NAME: &str = "user_name";
pub const KEY_DARK_THEME: &str = "dark_theme_enabled";
pub const KEY_PREFERRED_LANGUAGE: &str = "preferred_language";
pub const KEY_NOTIFICATION_VOLUME: &str = "notification_volume";
pub const KEY_LAST_ACCESS_TIME: &str = "last_access_time";
pub const KEY_LAST_LOCATION_LAT: &str = "last_location_latitude";
pub const KEY_LAST_LOCATION_LNG: &str = "last_location_longitude";
pub const KEY_TOTAL_USAGE_TIME: &str = "total_usage_time_seconds";

/// A change to a single field of the configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigUpdate {
    UserName(String),
    DarkTheme(bool),
    /// ISO 639-1 code; rejected unless it is a supported language.
    PreferredLanguage(String),
    /// Any integer; clamped onto 0–100.
    NotificationVolume(i64),
    /// Both coordinates or neither (which clears the location).
    Location {
        latitude: Option<f64>,
        longitude: Option<f64>,
    },
    /// Stamp the current time, never moving backwards.
    LastAccessNow,
    /// Fold a completed session into the usage total.
    AddUsageSeconds(u64),
}

impl ConfigUpdate {
    fn field_name(&self) -> &'static str {
        match self {
            Self::UserName(_) => KEY_USER_NAME,
            Self::DarkTheme(_) => KEY_DARK_THEME,
            Self::PreferredLanguage(_) => KEY_PREFERRED_LANGUAGE,
            Self::NotificationVolume(_) => KEY_NOTIFICATION_VOLUME,
            Self::Location { .. } => "last_location",
            Self::LastAccessNow => KEY_LAST_ACCESS_TIME,
            Self::AddUsageSeconds(_) => KEY_TOTAL_USAGE_TIME,
        }
    }
}

struct StoreState {
    backend: Box<dyn KeyValueStore>,
    /// Authoritative copy; `None` until first read from the backend.
    cached: Option<UserConfiguration>,
    /// Bumped on every committed mutation.
    revision: u64,
}

/// Encrypted, durable home of the user's configuration.
pub struct ConfigurationStore {
    state: Mutex<StoreState>,
    codec: EncryptionCodec,
    clock: Arc<dyn Clock>,
    /// Usage total of the cached record, readable without the state lock.
    usage_seconds: AtomicU64,
    usage_known: AtomicBool,
}

impl ConfigurationStore {
    pub fn new(
        backend: Box<dyn KeyValueStore>,
        codec: EncryptionCodec,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(StoreState {
                backend,
                cached: None,
                revision: 0,
            }),
            codec,
            clock,
            usage_seconds: AtomicU64::new(0),
            usage_known: AtomicBool::new(false),
        }
    }

    /// The clock used for access-time stamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Current configuration, or the defaults when nothing readable is
    /// stored.  Never fails.
    ///
    /// A record that does not decrypt or parse is logged and replaced by
    /// defaults, so a corrupt cache cannot lock the user out.  When the
    /// backend itself cannot be read the defaults are returned but not
    /// adopted; the next call reads again.
    pub fn load(&self) -> UserConfiguration {
        self.load_snapshot().config
    }

    /// [`load`](Self::load) together with the commit revision.
    pub fn load_snapshot(&self) -> ConfigSnapshot {
        let mut guard = self.lock();
        let state = &mut *guard;
        let config = match self.current(state) {
            Ok(config) => config.clone(),
            Err(e) => {
                warn!(error = %e, "configuration backend unreadable; showing defaults");
                UserConfiguration::default()
            }
        };
        ConfigSnapshot {
            revision: state.revision,
            config,
        }
    }

    /// Usage total of the last committed record, without waiting on a write
    /// in progress.  `None` until the record has been read once.
    pub fn committed_usage_seconds(&self) -> Option<u64> {
        if self.usage_known.load(Ordering::Acquire) {
            Some(self.usage_seconds.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Replace the whole record.
    ///
    /// The user name is trimmed and every field validated first.  A record
    /// whose usage total is below the stored one is rejected: it can only
    /// come from a stale copy.  An older last access time is not an error
    /// (stale copies are routine) but the stored, later one is kept.  On
    /// failure nothing changes, durably or in memory.
    #[instrument(skip_all)]
    pub fn save(&self, mut config: UserConfiguration) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let stored = self.current(state)?;
        if config.total_usage_seconds < stored.total_usage_seconds {
            return Err(ValidationError::UsageWentBackwards {
                stored: stored.total_usage_seconds,
                attempted: config.total_usage_seconds,
            }
            .into());
        }
        config.last_access_epoch_millis = config
            .last_access_epoch_millis
            .max(stored.last_access_epoch_millis);
        self.commit_record(state, config)?;
        info!("configuration saved");
        Ok(())
    }

    /// Apply one field change as a single read-modify-write and return the
    /// committed record.
    #[instrument(skip_all, fields(field = update.field_name()))]
    pub fn update_field(&self, update: ConfigUpdate) -> Result<UserConfiguration> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut next = self.current(state)?.clone();
        self.apply(&mut next, update)?;
        let committed = self.commit_record(state, next)?;
        debug!("field updated");
        Ok(committed)
    }

    pub fn update_user_name(&self, user_name: &str) -> Result<UserConfiguration> {
        self.update_field(ConfigUpdate::UserName(user_name.to_owned()))
    }

    pub fn update_dark_theme(&self, enabled: bool) -> Result<UserConfiguration> {
        self.update_field(ConfigUpdate::DarkTheme(enabled))
    }

    pub fn update_preferred_language(&self, code: &str) -> Result<UserConfiguration> {
        self.update_field(ConfigUpdate::PreferredLanguage(code.to_owned()))
    }

    pub fn update_notification_volume(&self, volume: i64) -> Result<UserConfiguration> {
        self.update_field(ConfigUpdate::NotificationVolume(volume))
    }

    pub fn update_location(
        &self,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<UserConfiguration> {
        self.update_field(ConfigUpdate::Location {
            latitude,
            longitude,
        })
    }

    pub fn clear_location(&self) -> Result<UserConfiguration> {
        self.update_location(None, None)
    }

    pub fn update_last_access_time(&self) -> Result<UserConfiguration> {
        self.update_field(ConfigUpdate::LastAccessNow)
    }

    pub fn add_usage_seconds(&self, seconds: u64) -> Result<UserConfiguration> {
        self.update_field(ConfigUpdate::AddUsageSeconds(seconds))
    }

    /// Whether a record has been saved and not cleared since.
    pub fn has_stored_configuration(&self) -> bool {
        let guard = self.lock();
        match guard.backend.contains(KEY_USER_NAME) {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "could not check for stored configuration");
                false
            }
        }
    }

    /// Erase the persisted record.  Afterwards `load` returns the defaults.
    #[instrument(skip_all)]
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let cleared = state.backend.clear().and_then(|()| state.backend.commit());
        if let Err(e) = cleared {
            state.backend.rollback();
            error!(error = %e, "clearing configuration failed; previous value kept");
            return Err(e);
        }
        self.adopt(state, UserConfiguration::default());
        state.revision += 1;
        info!("configuration cleared");
        Ok(())
    }

    /// The current record as camelCase JSON, for backup.
    pub fn export_configuration(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.load())?)
    }

    /// Restore a record produced by [`export_configuration`](Self::export_configuration).
    ///
    /// Goes through [`save`](Self::save), so the same validation applies.
    pub fn import_configuration(&self, value: serde_json::Value) -> Result<()> {
        let config: UserConfiguration = serde_json::from_value(value)?;
        self.save(config)
    }

    // -- internals -----------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // The cache is only replaced after a successful commit, so the state
        // behind a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached record, reading it from the backend on first use.
    ///
    /// Fails, and caches nothing, when the backend cannot be read: mutating
    /// from defaults would overwrite a record that is still intact.
    fn current<'a>(&self, state: &'a mut StoreState) -> Result<&'a UserConfiguration> {
        let config = match state.cached.take() {
            Some(config) => config,
            None => {
                let config = self.read_record(state.backend.as_ref())?;
                self.note_usage(config.total_usage_seconds);
                config
            }
        };
        Ok(state.cached.insert(config))
    }

    fn adopt(&self, state: &mut StoreState, config: UserConfiguration) {
        self.note_usage(config.total_usage_seconds);
        state.cached = Some(config);
    }

    fn note_usage(&self, seconds: u64) {
        self.usage_seconds.store(seconds, Ordering::Release);
        self.usage_known.store(true, Ordering::Release);
    }

    fn apply(
        &self,
        config: &mut UserConfiguration,
        update: ConfigUpdate,
    ) -> std::result::Result<(), ValidationError> {
        match update {
            ConfigUpdate::UserName(name) => config.user_name = name,
            ConfigUpdate::DarkTheme(enabled) => config.theme_dark = enabled,
            ConfigUpdate::PreferredLanguage(code) => {
                config.preferred_language = Language::from_code(&code)?;
            }
            ConfigUpdate::NotificationVolume(volume) => {
                config.notification_volume = UserConfiguration::clamp_volume(volume);
            }
            ConfigUpdate::Location {
                latitude,
                longitude,
            } => {
                config.last_location = GeoLocation::from_parts(latitude, longitude)?;
            }
            ConfigUpdate::LastAccessNow => {
                let now = self.clock.now_millis();
                config.last_access_epoch_millis = config.last_access_epoch_millis.max(now);
            }
            ConfigUpdate::AddUsageSeconds(seconds) => {
                config.total_usage_seconds = config.total_usage_seconds.saturating_add(seconds);
            }
        }
        Ok(())
    }

    /// Validate, write and cache `next`.  Leaves everything untouched on
    /// failure.
    fn commit_record(
        &self,
        state: &mut StoreState,
        next: UserConfiguration,
    ) -> Result<UserConfiguration> {
        let next = next.normalized();
        next.validate()?;

        if let Err(e) = self.write_record(state.backend.as_mut(), &next) {
            state.backend.rollback();
            error!(error = %e, "configuration write failed; previous value kept");
            return Err(e);
        }

        self.adopt(state, next.clone());
        state.revision += 1;
        Ok(next)
    }

    fn write_record(&self, backend: &mut dyn KeyValueStore, config: &UserConfiguration) -> Result<()> {
        let mut fields = vec![
            (KEY_USER_NAME, config.user_name.clone()),
            (KEY_DARK_THEME, config.theme_dark.to_string()),
            (KEY_PREFERRED_LANGUAGE, config.preferred_language.code().to_owned()),
            (KEY_NOTIFICATION_VOLUME, config.notification_volume.to_string()),
            (KEY_LAST_ACCESS_TIME, config.last_access_epoch_millis.to_string()),
            (KEY_TOTAL_USAGE_TIME, config.total_usage_seconds.to_string()),
        ];
        if let Some(location) = &config.last_location {
            fields.push((KEY_LAST_LOCATION_LAT, location.latitude.to_string()));
            fields.push((KEY_LAST_LOCATION_LNG, location.longitude.to_string()));
        }

        // Encrypt everything before staging anything.
        let mut sealed = Vec::with_capacity(fields.len());
        for (key, value) in &fields {
            sealed.push((*key, self.codec.encrypt_bound(key, value)?));
        }

        for (key, blob) in &sealed {
            backend.put(key, blob)?;
        }
        if config.last_location.is_none() {
            backend.remove(KEY_LAST_LOCATION_LAT)?;
            backend.remove(KEY_LAST_LOCATION_LNG)?;
        }
        backend.commit()
    }

    /// Decode the stored record.  Undecryptable or unparsable contents
    /// yield the defaults; backend failures are returned.
    fn read_record(&self, backend: &dyn KeyValueStore) -> Result<UserConfiguration> {
        match self.decode_record(backend) {
            Ok(Some(config)) => {
                debug!("stored configuration loaded");
                Ok(config)
            }
            Ok(None) => {
                debug!("no stored configuration; using defaults");
                Ok(UserConfiguration::default())
            }
            Err(e @ (PrefvaultError::Decryption(_) | PrefvaultError::CorruptRecord(_))) => {
                warn!(error = %e, "stored configuration unreadable; using defaults");
                Ok(UserConfiguration::default())
            }
            Err(e) => Err(e),
        }
    }

    fn decode_record(&self, backend: &dyn KeyValueStore) -> Result<Option<UserConfiguration>> {
        if !backend.contains(KEY_USER_NAME)? {
            return Ok(None);
        }
        let defaults = UserConfiguration::default();

        let preferred_language = match self.read_field(backend, KEY_PREFERRED_LANGUAGE)? {
            Some(code) => Language::from_code(&code).unwrap_or_else(|e| {
                warn!(error = %e, "stored language unsupported; using default");
                defaults.preferred_language
            }),
            None => defaults.preferred_language,
        };

        let latitude = self.read_parsed::<f64>(backend, KEY_LAST_LOCATION_LAT)?;
        let longitude = self.read_parsed::<f64>(backend, KEY_LAST_LOCATION_LNG)?;
        let last_location = GeoLocation::from_parts(latitude, longitude).unwrap_or_else(|e| {
            warn!(error = %e, "stored location invalid; dropping it");
            None
        });

        Ok(Some(UserConfiguration {
            user_name: self.read_field(backend, KEY_USER_NAME)?.unwrap_or_default(),
            theme_dark: self
                .read_parsed(backend, KEY_DARK_THEME)?
                .unwrap_or(defaults.theme_dark),
            preferred_language,
            notification_volume: self
                .read_parsed::<i64>(backend, KEY_NOTIFICATION_VOLUME)?
                .map_or(defaults.notification_volume, UserConfiguration::clamp_volume),
            last_access_epoch_millis: self
                .read_parsed(backend, KEY_LAST_ACCESS_TIME)?
                .unwrap_or(defaults.last_access_epoch_millis),
            last_location,
            total_usage_seconds: self
                .read_parsed(backend, KEY_TOTAL_USAGE_TIME)?
                .unwrap_or(defaults.total_usage_seconds),
        }))
    }

    fn read_field(&self, backend: &dyn KeyValueStore, key: &str) -> Result<Option<String>> {
        backend
            .get(key)?
            .map(|blob| self.codec.decrypt_bound(key, &blob))
            .transpose()
    }

    fn read_parsed<T>(&self, backend: &dyn KeyValueStore, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.read_field(backend, key)?
            .map(|text| {
                text.parse::<T>()
                    .map_err(|e| PrefvaultError::CorruptRecord(format!("{key}: {e}")))
            })
            .transpose()
    }
}
