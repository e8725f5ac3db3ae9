// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Prefvault.

use thiserror::Error;

/// Top-level error type for all Prefvault operations.
#[derive(Debug, Error)]
pub enum PrefvaultError {
    // -- Cryptography --
    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("secure key facility error: {0}")]
    KeyFacility(String),

    // -- Storage / persistence --
    #[error("could not persist configuration: {0}")]
    Persistence(String),

    #[error("stored configuration is unreadable: {0}")]
    CorruptRecord(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Input --
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    // -- Runtime --
    #[error("background task failed: {0}")]
    Task(String),
}

/// A rejected configuration value, naming the constraint it violated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown language code {0:?} (expected one of es, en, fr, de)")]
    UnknownLanguage(String),

    #[error("notification volume {0} is outside 0..=100")]
    VolumeOutOfRange(i64),

    #[error("location is missing its {missing}; latitude and longitude must be set together")]
    PartialLocation { missing: &'static str },

    #[error("{axis} {value} is outside the valid range")]
    CoordinateOutOfRange { axis: &'static str, value: f64 },

    #[error("total usage cannot go backwards ({stored}s stored, {attempted}s given)")]
    UsageWentBackwards { stored: u64, attempted: u64 },
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrefvaultError>;
