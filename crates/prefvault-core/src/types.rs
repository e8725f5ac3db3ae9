// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Prefvault preferences store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound of the notification volume scale.
pub const MAX_NOTIFICATION_VOLUME: u8 = 100;

/// Volume given to a freshly created configuration.
pub const DEFAULT_NOTIFICATION_VOLUME: u8 = 50;

/// Languages the application ships translations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
}

impl Language {
    /// Every supported language, in picker order.
    pub const ALL: [Language; 4] = [Self::Spanish, Self::English, Self::French, Self::German];

    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Spanish => "es",
            Self::English => "en",
            Self::French => "fr",
            Self::German => "de",
        }
    }

    /// Name of the language in that language, as shown in the picker.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Spanish => "Español",
            Self::English => "English",
            Self::French => "Français",
            Self::German => "Deutsch",
        }
    }

    /// Parse an ISO 639-1 code. Surrounding whitespace and case are ignored.
    pub fn from_code(code: &str) -> Result<Self, ValidationError> {
        let normalized = code.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == normalized)
            .ok_or_else(|| ValidationError::UnknownLanguage(code.to_owned()))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A last-known device position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    /// Build a location, rejecting non-finite or out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        let location = Self { latitude, longitude };
        location.validate()?;
        Ok(location)
    }

    /// Combine optional coordinates coming from a partial update.
    ///
    /// Both absent clears the location; exactly one present is rejected so a
    /// half-written position can never reach the store.
    pub fn from_parts(
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Option<Self>, ValidationError> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon).map(Some),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ValidationError::PartialLocation {
                missing: "longitude",
            }),
            (None, Some(_)) => Err(ValidationError::PartialLocation {
                missing: "latitude",
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ValidationError::CoordinateOutOfRange {
                axis: "latitude",
                value: self.latitude,
            });
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ValidationError::CoordinateOutOfRange {
                axis: "longitude",
                value: self.longitude,
            });
        }
        Ok(())
    }
}

/// Everything the user can configure, plus the bookkeeping the app keeps
/// about them. This is the single record the configuration store persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfiguration {
    /// Display name; stored trimmed, may be empty.
    pub user_name: String,
    pub theme_dark: bool,
    pub preferred_language: Language,
    /// Notification volume on a 0–100 scale.
    pub notification_volume: u8,
    /// Wall-clock milliseconds of the last foreground entry (0 = never).
    pub last_access_epoch_millis: i64,
    pub last_location: Option<GeoLocation>,
    /// Accumulated foreground time of all completed sessions.
    pub total_usage_seconds: u64,
}

impl Default for UserConfiguration {
    fn default() -> Self {
        Self {
            user_name: String::new(),
            theme_dark: false,
            preferred_language: Language::default(),
            notification_volume: DEFAULT_NOTIFICATION_VOLUME,
            last_access_epoch_millis: 0,
            last_location: None,
            total_usage_seconds: 0,
        }
    }
}

impl UserConfiguration {
    /// Clamp an arbitrary slider value onto the 0–100 volume scale.
    pub fn clamp_volume(volume: i64) -> u8 {
        volume.clamp(0, i64::from(MAX_NOTIFICATION_VOLUME)) as u8
    }

    /// Return the record in the canonical form it is stored in.
    pub fn normalized(mut self) -> Self {
        let trimmed = self.user_name.trim();
        if trimmed.len() != self.user_name.len() {
            self.user_name = trimmed.to_owned();
        }
        self
    }

    /// Check every field constraint that the type system does not.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.notification_volume > MAX_NOTIFICATION_VOLUME {
            return Err(ValidationError::VolumeOutOfRange(i64::from(
                self.notification_volume,
            )));
        }
        if let Some(location) = &self.last_location {
            location.validate()?;
        }
        Ok(())
    }

    pub fn has_valid_location(&self) -> bool {
        self.last_location.is_some()
    }

    /// Last foreground entry as a UTC timestamp, if there ever was one.
    pub fn last_access_at(&self) -> Option<DateTime<Utc>> {
        if self.last_access_epoch_millis <= 0 {
            return None;
        }
        DateTime::from_timestamp_millis(self.last_access_epoch_millis)
    }

    /// Total usage as `HH:MM:SS`. Hours are not wrapped at 24.
    pub fn formatted_usage_time(&self) -> String {
        let total = self.total_usage_seconds;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// A committed configuration together with its position in the commit
/// sequence. Observers use the revision to discard stale notifications.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigSnapshot {
    pub revision: u64,
    pub config: UserConfiguration,
}
