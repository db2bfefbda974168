use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// The two content managers this bridge can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendTarget {
    Movie,
    Series,
}

impl BackendTarget {
    pub fn service_name(&self) -> &'static str {
        match self {
            BackendTarget::Movie => "Radarr",
            BackendTarget::Series => "Sonarr",
        }
    }

    /// Key used for files in the local data directory.
    pub fn cache_key(&self) -> &'static str {
        match self {
            BackendTarget::Movie => "radarr",
            BackendTarget::Series => "sonarr",
        }
    }

    /// Resource path used to add content.
    pub fn content_path(&self) -> &'static str {
        match self {
            BackendTarget::Movie => "/movie",
            BackendTarget::Series => "/series",
        }
    }

    pub fn content_noun(&self) -> &'static str {
        match self {
            BackendTarget::Movie => "movie",
            BackendTarget::Series => "series",
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub id: i64,
    pub name: String,
}

/// Status of an asynchronous command as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Queued,
    Started,
    Completed,
    Failed,
    Unknown,
}

impl CommandStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "queued" => CommandStatus::Queued,
            "started" => CommandStatus::Started,
            "completed" => CommandStatus::Completed,
            "failed" | "aborted" | "cancelled" => CommandStatus::Failed,
            _ => CommandStatus::Unknown,
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommandStatus::Queued => "queued",
            CommandStatus::Started => "started",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
            CommandStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A search job accepted by a backend, owned by exactly one monitor.
#[derive(Debug, Clone)]
pub struct SubmittedCommand {
    pub target: BackendTarget,
    pub command_id: i64,
    pub title: String,
    pub started_at: DateTime<Utc>,
}

impl SubmittedCommand {
    pub fn new(target: BackendTarget, command_id: i64, title: impl Into<String>) -> Self {
        Self {
            target,
            command_id,
            title: title.into(),
            started_at: Utc::now(),
        }
    }
}

/// Content as created on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedContent {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPolicy {
    Always,
    Ask,
    Never,
}

impl SearchPolicy {
    /// Lenient parse of the `searchMode` setting. Anything unrecognised means `Ask`.
    pub fn from_setting(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return SearchPolicy::Ask;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "0" | "always" => SearchPolicy::Always,
            "1" | "ask" => SearchPolicy::Ask,
            "2" | "never" => SearchPolicy::Never,
            other => {
                warn!("Unrecognised search mode '{}', asking instead", other);
                SearchPolicy::Ask
            }
        }
    }
}

/// What the host asked us to add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub target: BackendTarget,
    pub external_id: i64,
}
