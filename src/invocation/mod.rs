use crate::models::{BackendTarget, ContentRequest};
use thiserror::Error;

/// What the host asked for, decoded from its plugin query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Add(ContentRequest),
    RefreshProfiles(BackendTarget),
    InstallIntegration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvocationError {
    #[error("this plugin can not be run independently")]
    NoParameters,
    #[error("invalid {kind} id '{value}'")]
    InvalidId { kind: &'static str, value: String },
    #[error("unknown action '{0}'")]
    UnknownAction(String),
}

impl Invocation {
    /// Accepts `?movie=603`, `tvshow=81189` or `action=<name>`.
    pub fn parse(params: &str) -> Result<Self, InvocationError> {
        let query = params.trim().trim_start_matches('?');
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let find = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        if let Some(value) = find("movie") {
            return parse_id("movie", value).map(|external_id| {
                Invocation::Add(ContentRequest {
                    target: BackendTarget::Movie,
                    external_id,
                })
            });
        }
        if let Some(value) = find("tvshow") {
            return parse_id("tvshow", value).map(|external_id| {
                Invocation::Add(ContentRequest {
                    target: BackendTarget::Series,
                    external_id,
                })
            });
        }

        match find("action") {
            Some("refresh_radarr_profiles") => Ok(Invocation::RefreshProfiles(BackendTarget::Movie)),
            Some("refresh_sonarr_profiles") => Ok(Invocation::RefreshProfiles(BackendTarget::Series)),
            Some("install_integration") => Ok(Invocation::InstallIntegration),
            Some(other) => Err(InvocationError::UnknownAction(other.to_string())),
            None => Err(InvocationError::NoParameters),
        }
    }
}

fn parse_id(kind: &'static str, value: &str) -> Result<i64, InvocationError> {
    value
        .trim()
        .parse()
        .map_err(|_| InvocationError::InvalidId {
            kind,
            value: value.to_string(),
        })
}
