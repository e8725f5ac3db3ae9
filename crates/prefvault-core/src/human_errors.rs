// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the settings screen.
//
// Every technical error is mapped to plain language with a clear suggestion.
// The severity drives how the front end presents it.

use crate::error::{PrefvaultError, ValidationError};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Storage hiccup; trying again may work.
    Transient,
    /// The user has to change what they entered.
    ActionRequired,
    /// Retrying will not help; something on the device needs attention.
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether repeating the same action might succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `PrefvaultError` into a `HumanError`.
pub fn humanize_error(err: &PrefvaultError) -> HumanError {
    match err {
        PrefvaultError::Validation(v) => humanize_validation(v),

        PrefvaultError::Persistence(_) | PrefvaultError::Io(_) => HumanError {
            message: "Your change was not saved.".into(),
            suggestion: "Check that the device has free storage space, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PrefvaultError::Task(_) => HumanError {
            message: "The app was interrupted while saving.".into(),
            suggestion: "Try again. Your previous settings are still in place.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PrefvaultError::Decryption(_) | PrefvaultError::CorruptRecord(_) => HumanError {
            message: "Your saved settings could not be read.".into(),
            suggestion: "The defaults are being used instead. Saving any setting will replace the unreadable copy.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PrefvaultError::Encryption(_) | PrefvaultError::KeyFacility(_) => HumanError {
            message: "Secure storage is not available.".into(),
            suggestion: "Restart the app. If this keeps happening, check the device's lock screen and security settings.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PrefvaultError::Serialization(detail) => HumanError {
            message: "That settings file could not be understood.".into(),
            suggestion: format!("Make sure it is a settings export from this app. (Detail: {detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

fn humanize_validation(err: &ValidationError) -> HumanError {
    let (message, suggestion) = match err {
        ValidationError::UnknownLanguage(code) => (
            format!("\"{code}\" is not a language the app supports."),
            "Choose Español (es), English (en), Français (fr) or Deutsch (de).".to_owned(),
        ),
        ValidationError::VolumeOutOfRange(_) => (
            "That volume is out of range.".to_owned(),
            "Pick a volume between 0 and 100.".to_owned(),
        ),
        ValidationError::PartialLocation { missing } => (
            format!("The location is missing its {missing}."),
            "Enter both latitude and longitude, or clear the location.".to_owned(),
        ),
        ValidationError::CoordinateOutOfRange { axis, .. } => (
            format!("That {axis} is not on the map."),
            "Latitude must be between -90 and 90, longitude between -180 and 180.".to_owned(),
        ),
        ValidationError::UsageWentBackwards { .. } => (
            "These settings are older than the ones already saved.".to_owned(),
            "Reload your settings and make the change again.".to_owned(),
        ),
    };
    HumanError {
        message,
        suggestion,
        retriable: false,
        severity: Severity::ActionRequired,
    }
}
