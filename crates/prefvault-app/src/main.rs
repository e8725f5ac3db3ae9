// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Prefvault — encrypted on-device preferences
//
// Entry point. Resolves the data directory, loads settings, initialises
// logging and backend services, then runs one command.

mod cli;
mod commands;
mod services;

use std::process::ExitCode;

use clap::Parser;
use prefvault_core::AppSettings;
use prefvault_core::human_errors::humanize_error;

use cli::Args;
use services::app_services::AppServices;
use services::data_dir;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let dir = match data_dir::data_dir(args.data_dir.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("prefvault: cannot use data directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Settings pick the default log filter, so they are read before logging
    // exists; a bad file is reported once the subscriber is up.
    let (settings, settings_error) = match AppSettings::load_from_dir(&dir) {
        Ok(settings) => (settings.unwrap_or_default(), None),
        Err(e) => (AppSettings::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter)),
        )
        .init();

    if let Some(e) = settings_error {
        tracing::warn!(error = %e, "settings file unreadable; using defaults");
    }
    tracing::debug!("Prefvault starting");

    let services = match AppServices::init(&dir, settings) {
        Ok(services) => services,
        Err(e) => return report(&e),
    };
    tracing::debug!(
        path = %services.data_dir().display(),
        key_alias = %services.settings().key_alias,
        "services ready"
    );

    let mut stdout = std::io::stdout().lock();
    match commands::run(args.command, &services, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn report(err: &prefvault_core::PrefvaultError) -> ExitCode {
    tracing::error!(error = %err, "command failed");
    let human = humanize_error(err);
    eprintln!("{}\n{}", human.message, human.suggestion);
    if human.retriable {
        // EX_TEMPFAIL
        ExitCode::from(75)
    } else {
        ExitCode::FAILURE
    }
}
