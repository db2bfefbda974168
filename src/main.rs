use anyhow::Result;
use clap::Parser;
use helparr::integration::{install_integration, InstallStatus};
use helparr::invocation::Invocation;
use helparr::{
    BackendTarget, CancelAction, CommandSubmitter, Configuration, Endpoint, Interaction,
    MonitorState, Notification, NotificationSink, OutcomeNotifier, ProfileCache, ProgressUpdate,
    QualityProfile, RemoteClient, SubmitOutcome,
};
use inquire::{Confirm, Select};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Plugin parameters from the host, e.g. "?movie=603" or "?action=refresh_radarr_profiles"
    params: String,
}

/// Terminal stand-in for the host's dialogs.
struct ConsoleFrontend;

impl Interaction for ConsoleFrontend {
    fn confirm_search(&self, title: &str) -> bool {
        Confirm::new(&format!("Search for {} now?", title))
            .with_default(true)
            .prompt()
            .unwrap_or(false)
    }

    fn choose_profile(&self, target: BackendTarget, profiles: &[QualityProfile]) -> Option<i64> {
        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        let chosen = Select::new(&format!("{} quality profile:", target), names)
            .raw_prompt()
            .ok()?;
        profile_id_at(profiles, chosen.index)
    }

    fn choose_cancel_action(&self, title: &str) -> CancelAction {
        let options = vec!["Stop monitoring", "Continue in background"];
        match Select::new(&format!("Search for {} is still running:", title), options).prompt() {
            Ok("Continue in background") => CancelAction::Background,
            _ => CancelAction::Stop,
        }
    }
}

/// Profile names are not unique, so the dialog answer is resolved by position.
fn profile_id_at(profiles: &[QualityProfile], index: usize) -> Option<i64> {
    profiles.get(index).map(|p| p.id)
}

struct ConsoleNotifications {
    config_path: PathBuf,
}

impl NotificationSink for ConsoleNotifications {
    fn notify(&self, notification: &Notification) {
        println!("{}: {}", notification.heading, notification.message);
        if notification.offer_configuration {
            println!(
                "Check the {} settings in {}",
                notification.target.cache_key(),
                self.config_path.display()
            );
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let invocation = match Invocation::parse(&cli.params) {
        Ok(invocation) => invocation,
        Err(e) => {
            println!("Attention: {}", e);
            return Ok(false);
        }
    };

    let config = Configuration::from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config.display());

    let client = RemoteClient::new();
    let cache = ProfileCache::new(config.data_dir());

    match invocation {
        Invocation::InstallIntegration => match install_integration(&config.integration_dir())? {
            InstallStatus::Installed(path) => {
                println!("Integration installed: {}", path.display());
                Ok(true)
            }
            InstallStatus::AlreadyInstalled(path) => {
                println!("Integration already installed: {}", path.display());
                Ok(true)
            }
        },
        Invocation::RefreshProfiles(target) => {
            let endpoint = Endpoint::new(target, config.backend(target)?)?;
            match cache.refresh(&client, &endpoint).await {
                Ok(count) => {
                    println!("Loaded {} {} quality profiles", count, target);
                    Ok(true)
                }
                Err(e) => {
                    println!("Error: could not load {} quality profiles: {}", target, e);
                    Ok(false)
                }
            }
        }
        Invocation::Add(request) => {
            let notifier = OutcomeNotifier::new(Arc::new(ConsoleNotifications {
                config_path: cli.config.clone(),
            }));
            let submitter =
                CommandSubmitter::new(client, cache, Arc::new(ConsoleFrontend), notifier);

            let mut handle = match submitter.submit(&config, &request).await {
                Ok(SubmitOutcome::SearchStarted(handle)) => handle,
                Ok(_) => return Ok(true),
                Err(_) => return Ok(false),
            };

            if let Some(mut updates) = handle.take_updates() {
                tokio::spawn(async move {
                    while let Some(update) = updates.recv().await {
                        match update {
                            ProgressUpdate::Polling {
                                attempt,
                                max_attempts,
                                percent,
                                status,
                            } => eprintln!("[{:>3}%] {} ({}/{})", percent, status, attempt, max_attempts),
                            ProgressUpdate::ConnectionIssues { attempt } => {
                                eprintln!("[ ?? ] connection issues (attempt {})", attempt)
                            }
                            ProgressUpdate::Finished { success } => {
                                eprintln!("[100%] {}", if success { "done" } else { "failed" })
                            }
                        }
                    }
                });
            }

            let canceller = handle.canceller();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    canceller.cancel();
                }
            });

            let outcome = handle.join().await;
            if outcome.backgrounded {
                warn!("Search finished while running in the background");
            }
            Ok(outcome.state != MonitorState::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_profile_names_resolve_by_position() {
        let profiles = vec![
            QualityProfile { id: 3, name: "HD".to_string() },
            QualityProfile { id: 8, name: "HD".to_string() },
        ];
        assert_eq!(profile_id_at(&profiles, 1), Some(8));
        assert_eq!(profile_id_at(&profiles, 0), Some(3));
        assert_eq!(profile_id_at(&profiles, 2), None);
    }
}
