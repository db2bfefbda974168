//! User-facing outcomes and the host dialogs the core needs.
//!
//! The core never draws anything itself. It asks questions through
//! [`Interaction`] and reports terminal results through [`OutcomeNotifier`],
//! which turns them into a single [`Notification`] for the host.

use crate::error::HelparrError;
use crate::models::{AddedContent, BackendTarget, QualityProfile};
use std::sync::Arc;
use tracing::{info, warn};

/// What to do after the user asked to cancel a running search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    Stop,
    Background,
}

/// Synchronous dialogs provided by the host.
pub trait Interaction: Send + Sync {
    fn confirm_search(&self, title: &str) -> bool;

    /// Returns the chosen profile id, or `None` if the dialog was dismissed.
    fn choose_profile(&self, target: BackendTarget, profiles: &[QualityProfile]) -> Option<i64>;

    fn choose_cancel_action(&self, title: &str) -> CancelAction;
}

/// Runs a host dialog on the blocking pool so async tasks keep running while
/// the user decides. `fallback` is used if the dialog panics.
pub async fn ask<T, F>(interaction: &Arc<dyn Interaction>, dialog: F, fallback: T) -> T
where
    T: Send + 'static,
    F: FnOnce(&dyn Interaction) -> T + Send + 'static,
{
    let interaction = Arc::clone(interaction);
    match tokio::task::spawn_blocking(move || dialog(interaction.as_ref())).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Dialog failed: {}", e);
            fallback
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Added,
    SearchStarted,
    SearchNotStarted,
    SearchCompleted,
    SearchFailed,
    SearchTimedOut,
    MonitoringStopped,
    AddFailed,
}

impl NotificationKind {
    /// Whether this notification ends a run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, NotificationKind::SearchStarted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub target: BackendTarget,
    pub heading: String,
    pub message: String,
    pub offer_configuration: bool,
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification);
}

#[derive(Clone)]
pub struct OutcomeNotifier {
    sink: Arc<dyn NotificationSink>,
}

impl OutcomeNotifier {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// Terminal success for runs that have nothing to monitor.
    pub fn added(&self, target: BackendTarget, content: &AddedContent, search_requested: bool) {
        let message = if search_requested {
            format!("{} added to {}, search requested", content.title, target)
        } else {
            format!("{} added to {}", content.title, target)
        };
        self.emit(NotificationKind::Added, target, "Success", message, false);
    }

    pub fn search_started(&self, target: BackendTarget, content: &AddedContent) {
        self.emit(
            NotificationKind::SearchStarted,
            target,
            "Success",
            format!("{} added to {}, search started", content.title, target),
            false,
        );
    }

    /// The content exists on the backend; only the search request was refused.
    pub fn search_not_started(&self, target: BackendTarget, content: &AddedContent, error: &HelparrError) {
        self.emit(
            NotificationKind::SearchNotStarted,
            target,
            "Added without search",
            format!(
                "{} added to {}, but the search could not be started: {}",
                content.title, target, error
            ),
            error.suggests_configuration(),
        );
    }

    pub fn search_completed(&self, target: BackendTarget, title: &str) {
        self.emit(
            NotificationKind::SearchCompleted,
            target,
            "Search completed",
            format!("{} search completed for {}", target, title),
            false,
        );
    }

    pub fn search_failed(&self, target: BackendTarget, title: &str) {
        self.emit(
            NotificationKind::SearchFailed,
            target,
            "Search failed",
            format!("{} search failed for {}", target, title),
            false,
        );
    }

    pub fn search_timed_out(&self, target: BackendTarget, title: &str) {
        self.emit(
            NotificationKind::SearchTimedOut,
            target,
            "Search timed out",
            format!(
                "Stopped waiting for the {} search for {}; it may still finish on the server",
                target, title
            ),
            false,
        );
    }

    pub fn monitoring_stopped(&self, target: BackendTarget, title: &str) {
        self.emit(
            NotificationKind::MonitoringStopped,
            target,
            "Monitoring stopped",
            format!("No longer following the {} search for {}", target, title),
            false,
        );
    }

    pub fn add_failed(&self, target: BackendTarget, error: &HelparrError) {
        self.emit(
            NotificationKind::AddFailed,
            target,
            "Error",
            error.to_string(),
            error.suggests_configuration(),
        );
    }

    fn emit(
        &self,
        kind: NotificationKind,
        target: BackendTarget,
        heading: &str,
        message: String,
        offer_configuration: bool,
    ) {
        info!(?kind, %target, "{}", message);
        self.sink.notify(&Notification {
            kind,
            target,
            heading: heading.to_string(),
            message,
            offer_configuration,
        });
    }
}
