//! Follows a submitted search command until it completes, fails, times out or
//! the user stops watching it.
//!
//! A monitor runs as its own tokio task. Progress goes out over an unbounded
//! channel, the terminal outcome comes back through [`MonitorHandle::join`], and
//! exactly one terminal notification is emitted before the task ends.
//!
//! Cancellation is cooperative: the signal is only looked at between polls, so
//! the worst-case delay is one request timeout plus one poll interval.

use crate::config::BackendSettings;
use crate::http::{CommandStatusSource, Endpoint};
use crate::models::{CommandStatus, SubmittedCommand};
use crate::notify::{ask, CancelAction, Interaction, OutcomeNotifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Progress never reaches 100% before the backend says the command completed.
const PROGRESS_CEILING: u64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub budget: Duration,
}

impl MonitorSettings {
    pub fn from_backend(settings: &BackendSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            budget: settings.monitor_budget(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let attempts = self.budget.as_millis() / interval;
        attempts.clamp(1, u32::MAX as u128) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub state: MonitorState,
    /// Number of status polls made.
    pub attempts: u32,
    /// Whether the user sent the run to the background.
    pub backgrounded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    Polling {
        attempt: u32,
        max_attempts: u32,
        percent: u8,
        status: CommandStatus,
    },
    ConnectionIssues {
        attempt: u32,
    },
    Finished {
        success: bool,
    },
}

pub fn progress_percent(attempt: u32, max_attempts: u32) -> u8 {
    let max = u64::from(max_attempts.max(1));
    let scaled = u64::from(attempt) * PROGRESS_CEILING / max;
    scaled.min(PROGRESS_CEILING) as u8
}

/// Raises the cancel signal of a running monitor. Cheap to clone.
#[derive(Clone)]
pub struct Canceller(Arc<watch::Sender<bool>>);

impl Canceller {
    pub fn cancel(&self) {
        // The monitor may already be gone; nothing to do then.
        let _ = self.0.send(true);
    }
}

pub struct MonitorHandle {
    command: SubmittedCommand,
    canceller: Canceller,
    updates: Option<mpsc::UnboundedReceiver<ProgressUpdate>>,
    task: JoinHandle<MonitorOutcome>,
}

impl MonitorHandle {
    pub fn command(&self) -> &SubmittedCommand {
        &self.command
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Takes the progress stream. Only the first caller gets it.
    pub fn take_updates(&mut self) -> Option<mpsc::UnboundedReceiver<ProgressUpdate>> {
        self.updates.take()
    }

    pub async fn join(self) -> MonitorOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Monitor task for command {} died: {}", self.command.command_id, e);
                MonitorOutcome {
                    state: MonitorState::Failed,
                    attempts: 0,
                    backgrounded: false,
                }
            }
        }
    }
}

pub struct ProgressMonitor {
    source: Arc<dyn CommandStatusSource>,
    endpoint: Endpoint,
    command: SubmittedCommand,
    settings: MonitorSettings,
    interaction: Arc<dyn Interaction>,
    notifier: OutcomeNotifier,
}

impl ProgressMonitor {
    pub fn new(
        source: Arc<dyn CommandStatusSource>,
        endpoint: Endpoint,
        command: SubmittedCommand,
        settings: MonitorSettings,
        interaction: Arc<dyn Interaction>,
        notifier: OutcomeNotifier,
    ) -> Self {
        Self {
            source,
            endpoint,
            command,
            settings,
            interaction,
            notifier,
        }
    }

    /// Starts polling on the tokio runtime and returns immediately.
    pub fn spawn(self) -> MonitorHandle {
        let run_id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let command = self.command.clone();

        let task = tokio::spawn(self.run(run_id, cancel_rx, updates_tx));

        MonitorHandle {
            command,
            canceller: Canceller(Arc::new(cancel_tx)),
            updates: Some(updates_rx),
            task,
        }
    }

    #[instrument(
        skip(self, cancel_rx, updates),
        fields(target = %self.command.target, command_id = self.command.command_id)
    )]
    async fn run(
        self,
        run_id: Uuid,
        cancel_rx: watch::Receiver<bool>,
        updates: mpsc::UnboundedSender<ProgressUpdate>,
    ) -> MonitorOutcome {
        let max_attempts = self.settings.max_attempts();
        let target = self.command.target;
        let title = self.command.title.as_str();
        let mut attempt: u32 = 0;
        let mut backgrounded = false;

        info!(
            "Monitoring {} search for {} ({} polls every {:?})",
            target, title, max_attempts, self.settings.poll_interval
        );

        // The receiver may be dropped by a host that ignores progress.
        let show = |backgrounded: bool, update: ProgressUpdate| {
            if !backgrounded {
                let _ = updates.send(update);
            }
        };

        let finish = |state: MonitorState, attempts: u32, backgrounded: bool| {
            let elapsed = chrono::Utc::now() - self.command.started_at;
            info!(
                "Search for {} ended {:?} after {} polls ({}s)",
                title,
                state,
                attempts,
                elapsed.num_seconds()
            );
            MonitorOutcome {
                state,
                attempts,
                backgrounded,
            }
        };

        loop {
            if !backgrounded && *cancel_rx.borrow() {
                let asked = title.to_string();
                let action = ask(
                    &self.interaction,
                    move |i| i.choose_cancel_action(&asked),
                    CancelAction::Stop,
                )
                .await;
                match action {
                    CancelAction::Stop => {
                        self.notifier.monitoring_stopped(target, title);
                        return finish(MonitorState::Cancelled, attempt, backgrounded);
                    }
                    CancelAction::Background => {
                        info!("Continuing search for {} in the background", title);
                        backgrounded = true;
                    }
                }
            }

            let poll = attempt + 1;
            match self
                .source
                .command_status(&self.endpoint, self.command.command_id)
                .await
            {
                Ok(CommandStatus::Completed) => {
                    show(backgrounded, ProgressUpdate::Finished { success: true });
                    self.notifier.search_completed(target, title);
                    return finish(MonitorState::Completed, poll, backgrounded);
                }
                Ok(CommandStatus::Failed) => {
                    show(backgrounded, ProgressUpdate::Finished { success: false });
                    self.notifier.search_failed(target, title);
                    return finish(MonitorState::Failed, poll, backgrounded);
                }
                Ok(status @ (CommandStatus::Queued | CommandStatus::Started)) => {
                    let percent = progress_percent(poll, max_attempts);
                    debug!("Poll {}/{}: {} ({}%)", poll, max_attempts, status, percent);
                    show(
                        backgrounded,
                        ProgressUpdate::Polling {
                            attempt: poll,
                            max_attempts,
                            percent,
                            status,
                        },
                    );
                }
                Ok(CommandStatus::Unknown) => {
                    warn!("Poll {}/{}: unrecognised command status", poll, max_attempts);
                    show(backgrounded, ProgressUpdate::ConnectionIssues { attempt: poll });
                }
                Err(e) => {
                    warn!("Poll {}/{} failed, will retry: {}", poll, max_attempts, e);
                    show(backgrounded, ProgressUpdate::ConnectionIssues { attempt: poll });
                }
            }

            sleep(self.settings.poll_interval).await;
            attempt += 1;

            if attempt >= max_attempts {
                self.notifier.search_timed_out(target, title);
                debug!(%run_id, "Monitor budget exhausted");
                return finish(MonitorState::TimedOut, attempt, backgrounded);
            }
        }
    }
}
