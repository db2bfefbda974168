//! Adds movies to Radarr and series to Sonarr on behalf of a media browser,
//! then follows the resulting search command until it settles.

pub mod config;
pub mod error;
pub mod http;
pub mod integration;
pub mod invocation;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod profiles;
pub mod radarr;
pub mod sonarr;
pub mod submit;

pub use config::{BackendSettings, Configuration};
pub use error::{ConfigError, FailureKind, HelparrError, RemoteError};
pub use http::{CommandStatusSource, Endpoint, RemoteClient};
pub use models::{BackendTarget, CommandStatus, ContentRequest, QualityProfile};
pub use monitor::{MonitorHandle, MonitorOutcome, MonitorState, ProgressMonitor, ProgressUpdate};
pub use notify::{CancelAction, Interaction, Notification, NotificationKind, NotificationSink, OutcomeNotifier};
pub use profiles::ProfileCache;
pub use submit::{CommandSubmitter, SubmitOutcome};
