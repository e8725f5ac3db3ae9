// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Prefvault — encrypted on-device preferences
///
/// Reads and changes the stored user configuration. Every value is
/// encrypted with a device key before it touches the disk.
#[derive(Parser, Debug)]
#[command(name = "prefvault")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Data directory (defaults to $PREFVAULT_DATA_DIR, then the XDG data home)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the current configuration
    Show,
    /// Set the user name
    SetName { name: String },
    /// Switch between the light and dark theme
    SetTheme {
        #[arg(value_parser = ["light", "dark"])]
        theme: String,
    },
    /// Set the preferred language (es, en, fr, de)
    SetLanguage { code: String },
    /// Set the notification volume; values outside 0-100 are clamped
    SetVolume {
        #[arg(allow_negative_numbers = true)]
        volume: i64,
    },
    /// Remember the last known location
    SetLocation {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
    },
    /// Forget the last known location
    ClearLocation,
    /// Record a foreground entry now
    Touch,
    /// Track a foreground session, showing the running total every second
    Track {
        /// Session length; Ctrl-C ends it early
        #[arg(long, default_value = "60")]
        seconds: u64,
    },
    /// Erase the stored configuration
    Reset,
    /// Print the configuration as JSON
    Export,
    /// Replace the configuration with a JSON file produced by `export`
    Import { file: PathBuf },
}
