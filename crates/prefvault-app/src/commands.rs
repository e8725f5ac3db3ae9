// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command handlers.  Each one is a thin call into `ConfigService` followed
// by a print of the committed result.

use std::io::Write;
use std::time::Duration;

use prefvault_core::error::Result;
use prefvault_core::types::UserConfiguration;
use prefvault_store::ConfigUpdate;
use tracing::{info, warn};

use crate::cli::Command;
use crate::services::app_services::AppServices;

pub async fn run(command: Command, services: &AppServices, out: &mut impl Write) -> Result<()> {
    let config = services.config();
    match command {
        Command::Show => print_config(out, &config.load().await?)?,
        Command::SetName { name } => {
            let updated = config.update(ConfigUpdate::UserName(name)).await?;
            writeln!(out, "user name: {:?}", updated.user_name)?;
        }
        Command::SetTheme { theme } => {
            let updated = config
                .update(ConfigUpdate::DarkTheme(theme == "dark"))
                .await?;
            writeln!(out, "theme: {}", theme_label(&updated))?;
        }
        Command::SetLanguage { code } => {
            let updated = config
                .update(ConfigUpdate::PreferredLanguage(code))
                .await?;
            writeln!(out, "language: {}", updated.preferred_language)?;
        }
        Command::SetVolume { volume } => {
            let updated = config
                .update(ConfigUpdate::NotificationVolume(volume))
                .await?;
            writeln!(out, "notification volume: {}", updated.notification_volume)?;
        }
        Command::SetLocation {
            latitude,
            longitude,
        } => {
            config
                .update(ConfigUpdate::Location {
                    latitude: Some(latitude),
                    longitude: Some(longitude),
                })
                .await?;
            writeln!(out, "location: {latitude}, {longitude}")?;
        }
        Command::ClearLocation => {
            config
                .update(ConfigUpdate::Location {
                    latitude: None,
                    longitude: None,
                })
                .await?;
            writeln!(out, "location: none")?;
        }
        Command::Touch => {
            let updated = config.update(ConfigUpdate::LastAccessNow).await?;
            writeln!(out, "last access: {}", last_access_label(&updated))?;
        }
        Command::Track { seconds } => track(services, seconds, out).await?,
        Command::Reset => {
            config.clear().await?;
            writeln!(out, "configuration reset to defaults")?;
        }
        Command::Export => {
            let exported = config.export_configuration().await?;
            writeln!(out, "{}", serde_json::to_string_pretty(&exported)?)?;
        }
        Command::Import { file } => {
            let data = tokio::fs::read_to_string(&file).await?;
            let value: serde_json::Value = serde_json::from_str(&data)?;
            config.import_configuration(value).await?;
            info!(path = %file.display(), "configuration imported");
            writeln!(out, "configuration imported from {}", file.display())?;
        }
    }
    Ok(())
}

/// Run a foreground session for `seconds`, printing the live total once a
/// second.  Ctrl-C ends the session early; either way it is folded in.
async fn track(services: &AppServices, seconds: u64, out: &mut impl Write) -> Result<()> {
    let config = services.config();
    config.start_tracking().await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted; ending session");
                break;
            }
            _ = ticker.tick() => {
                writeln!(out, "usage: {}", format_seconds(config.total_including_current()))?;
            }
        }
    }

    config.stop_tracking().await?;
    let total = config.load().await?.formatted_usage_time();
    writeln!(out, "session recorded; total usage {total}")?;
    Ok(())
}

fn print_config(out: &mut impl Write, config: &UserConfiguration) -> std::io::Result<()> {
    writeln!(out, "user name:           {:?}", config.user_name)?;
    writeln!(out, "theme:               {}", theme_label(config))?;
    writeln!(
        out,
        "language:            {} ({})",
        config.preferred_language.display_name(),
        config.preferred_language
    )?;
    writeln!(out, "notification volume: {}", config.notification_volume)?;
    writeln!(out, "last access:         {}", last_access_label(config))?;
    match &config.last_location {
        Some(location) => writeln!(
            out,
            "last location:       {}, {}",
            location.latitude, location.longitude
        )?,
        None => writeln!(out, "last location:       none")?,
    }
    writeln!(out, "total usage:         {}", config.formatted_usage_time())
}

fn theme_label(config: &UserConfiguration) -> &'static str {
    if config.theme_dark { "dark" } else { "light" }
}

fn last_access_label(config: &UserConfiguration) -> String {
    config
        .last_access_at()
        .map_or_else(|| "never".to_owned(), |at| at.to_rfc3339())
}

fn format_seconds(total: u64) -> String {
    UserConfiguration {
        total_usage_seconds: total,
        ..UserConfiguration::default()
    }
    .formatted_usage_time()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use prefvault_core::{AppSettings, ManualClock};

    use super::*;

    fn services(dir: &std::path::Path) -> AppServices {
        AppServices::init_with_clock(
            dir,
            AppSettings::default(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
        )
        .unwrap()
    }

    async fn run_to_string(command: Command, services: &AppServices) -> Result<String> {
        let mut out = Vec::new();
        run(command, services, &mut out).await?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn show_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_to_string(Command::Show, &services(dir.path())).await.unwrap();
        assert!(out.contains("theme:               light"));
        assert!(out.contains("Español (es)"));
        assert!(out.contains("notification volume: 50"));
        assert!(out.contains("last access:         never"));
        assert!(out.contains("total usage:         00:00:00"));
    }

    #[tokio::test]
    async fn setters_report_committed_values() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());

        let out = run_to_string(Command::SetVolume { volume: 150 }, &services)
            .await
            .unwrap();
        assert_eq!(out, "notification volume: 100\n");

        let out = run_to_string(
            Command::SetTheme {
                theme: "dark".into(),
            },
            &services,
        )
        .await
        .unwrap();
        assert_eq!(out, "theme: dark\n");

        let out = run_to_string(Command::Touch, &services).await.unwrap();
        assert!(out.starts_with("last access: 2023-11-14T"));
    }

    #[tokio::test]
    async fn unsupported_language_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        let err = run_to_string(Command::SetLanguage { code: "xx".into() }, &services)
            .await
            .unwrap_err();
        let human = prefvault_core::human_errors::humanize_error(&err);
        assert!(human.message.contains("xx"));
    }

    #[tokio::test]
    async fn export_reset_import() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        run_to_string(Command::SetName { name: " Ana ".into() }, &services)
            .await
            .unwrap();
        run_to_string(
            Command::SetLocation {
                latitude: 48.85,
                longitude: 2.35,
            },
            &services,
        )
        .await
        .unwrap();

        let exported = run_to_string(Command::Export, &services).await.unwrap();
        let backup = dir.path().join("backup.json");
        std::fs::write(&backup, &exported).unwrap();

        run_to_string(Command::Reset, &services).await.unwrap();
        assert!(
            run_to_string(Command::Show, &services)
                .await
                .unwrap()
                .contains("last location:       none")
        );

        run_to_string(Command::Import { file: backup }, &services)
            .await
            .unwrap();
        let shown = run_to_string(Command::Show, &services).await.unwrap();
        assert!(shown.contains("\"Ana\""));
        assert!(shown.contains("48.85, 2.35"));
    }

    #[tokio::test]
    async fn zero_second_track_records_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path());
        let out = run_to_string(Command::Track { seconds: 0 }, &services)
            .await
            .unwrap();
        assert!(out.contains("total usage 00:00:00"));
        assert_eq!(
            services.config().tracking_state(),
            prefvault_store::TrackingState::Idle
        );
    }
}
