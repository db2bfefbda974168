use crate::config::BackendSettings;
use crate::error::{ConfigError, FailureKind, RemoteError};
use crate::models::{BackendTarget, CommandStatus, QualityProfile};
use crate::{radarr, sonarr};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Every backend call is cut off after this long.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

const API_PREFIX: &str = "/api/v3";

/// A validated backend address and API key. Requests can only be built from one.
#[derive(Debug, Clone)]
pub struct Endpoint {
    target: BackendTarget,
    base: Url,
    api_key: String,
}

impl Endpoint {
    pub fn new(target: BackendTarget, settings: &BackendSettings) -> Result<Self, ConfigError> {
        let address = settings
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::MissingField {
                target,
                field: "address",
            })?;
        let api_key = settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingField {
                target,
                field: "API key",
            })?;

        let with_scheme = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        let base = Url::parse(&with_scheme).map_err(|e| ConfigError::InvalidAddress {
            target,
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            target,
            base,
            api_key: api_key.to_string(),
        })
    }

    pub fn target(&self) -> BackendTarget {
        self.target
    }

    /// `<address>/api/v3<path>?apikey=<key>&<query>`
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{}{}{}", prefix, API_PREFIX, path));
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("apikey", &self.api_key);
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url
    }
}

/// Source of command status, the only thing a progress monitor needs from a backend.
#[async_trait]
pub trait CommandStatusSource: Send + Sync {
    async fn command_status(
        &self,
        endpoint: &Endpoint,
        command_id: i64,
    ) -> Result<CommandStatus, RemoteError>;
}

#[derive(Clone)]
pub struct RemoteClient {
    client: Client,
}

impl RemoteClient {
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("helparr/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self { client }
    }

    #[instrument(skip(self, endpoint, query), fields(target = %endpoint.target()))]
    pub async fn get(
        &self,
        endpoint: &Endpoint,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, RemoteError> {
        debug!("Making GET request");
        self.send(self.client.get(endpoint.url(path, query))).await
    }

    #[instrument(skip(self, endpoint, body), fields(target = %endpoint.target()))]
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        path: &str,
        body: &B,
    ) -> Result<Value, RemoteError> {
        debug!("Making POST request");
        self.send(self.client.post(endpoint.url(path, &[])).json(body))
            .await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, RemoteError> {
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.text().await.map_err(classify)?;

        let payload = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str::<Value>(&body).ok()
        };

        if let Some(message) = payload.as_ref().and_then(application_error) {
            warn!("Backend rejected request: {}", message);
            return Err(RemoteError::new(FailureKind::Application, message));
        }

        if !status.is_success() {
            error!("HTTP request failed with status: {}", status);
            let reason = status.canonical_reason().unwrap_or("request failed");
            return Err(RemoteError::new(
                FailureKind::Http(status.as_u16()),
                reason.to_string(),
            ));
        }

        match payload {
            Some(value) => Ok(value),
            None if body.trim().is_empty() => Ok(Value::Null),
            None => Err(RemoteError::new(
                FailureKind::Protocol,
                "response was not valid JSON",
            )),
        }
    }

    #[instrument(skip(self, endpoint), fields(target = %endpoint.target()))]
    pub async fn quality_profiles(
        &self,
        endpoint: &Endpoint,
    ) -> Result<Vec<QualityProfile>, RemoteError> {
        let payload = self.get(endpoint, "/qualityprofile", &[]).await?;
        serde_json::from_value(payload).map_err(|e| {
            RemoteError::new(
                FailureKind::Protocol,
                format!("unexpected quality profile payload: {}", e),
            )
        })
    }

    /// Creates the movie or series and returns the resource the backend created.
    #[instrument(skip(self, endpoint, title), fields(target = %endpoint.target()))]
    pub async fn add_content(
        &self,
        endpoint: &Endpoint,
        title: &str,
        external_id: i64,
        root_folder: &str,
        quality_profile_id: i64,
    ) -> Result<Value, RemoteError> {
        let target = endpoint.target();
        match target {
            BackendTarget::Movie => {
                let body = radarr::add_movie(title, external_id, root_folder, quality_profile_id);
                self.post(endpoint, target.content_path(), &body).await
            }
            BackendTarget::Series => {
                let body = sonarr::add_series(title, external_id, root_folder, quality_profile_id);
                self.post(endpoint, target.content_path(), &body).await
            }
        }
    }

    /// Submits the backend's search command. `None` when no command id came back.
    #[instrument(skip(self, endpoint), fields(target = %endpoint.target()))]
    pub async fn start_search(
        &self,
        endpoint: &Endpoint,
        content_id: i64,
    ) -> Result<Option<i64>, RemoteError> {
        let payload = match endpoint.target() {
            BackendTarget::Movie => {
                self.post(endpoint, "/command", &radarr::movies_search(content_id))
                    .await?
            }
            BackendTarget::Series => {
                self.post(endpoint, "/command", &sonarr::series_search(content_id))
                    .await?
            }
        };
        Ok(payload.get("id").and_then(Value::as_i64))
    }
}

impl Default for RemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandStatusSource for RemoteClient {
    #[instrument(skip(self, endpoint), fields(target = %endpoint.target()))]
    async fn command_status(
        &self,
        endpoint: &Endpoint,
        command_id: i64,
    ) -> Result<CommandStatus, RemoteError> {
        let payload = self
            .get(endpoint, &format!("/command/{}", command_id), &[])
            .await?;
        let status = payload
            .get("status")
            .and_then(Value::as_str)
            .map(CommandStatus::parse)
            .unwrap_or(CommandStatus::Unknown);
        debug!("Command {} is {}", command_id, status);
        Ok(status)
    }
}

fn classify(e: reqwest::Error) -> RemoteError {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else if e.is_decode() {
        FailureKind::Protocol
    } else if let Some(status) = e.status() {
        FailureKind::Http(status.as_u16())
    } else {
        FailureKind::Connection
    };
    RemoteError::new(kind, e.to_string())
}

/// Pulls the message out of a payload carrying a `severity` marker.
fn application_error(payload: &Value) -> Option<String> {
    let entry = match payload {
        Value::Array(items) => items.first()?,
        other => other,
    };
    entry.get("severity")?;
    let message = entry
        .get("errorMessage")
        .or_else(|| entry.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("request rejected by backend");
    Some(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(address: &str) -> Endpoint {
        let settings = BackendSettings {
            address: Some(address.to_string()),
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        Endpoint::new(BackendTarget::Movie, &settings).unwrap()
    }

    #[test]
    fn endpoint_requires_address_and_key() {
        let settings = BackendSettings {
            address: Some("http://localhost:7878".to_string()),
            ..Default::default()
        };
        let err = Endpoint::new(BackendTarget::Movie, &settings).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "API key", .. }));

        let settings = BackendSettings {
            api_key: Some("k".to_string()),
            address: Some("   ".to_string()),
            ..Default::default()
        };
        let err = Endpoint::new(BackendTarget::Series, &settings).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: "address", .. }));
    }

    #[test]
    fn url_keeps_base_path_and_adds_key() {
        let url = endpoint("http://nas.local:7878/radarr/").url("/command/5", &[("x", "a b")]);
        assert_eq!(
            url.as_str(),
            "http://nas.local:7878/radarr/api/v3/command/5?apikey=secret&x=a+b"
        );
        let url = endpoint("localhost:7878").url("/qualityprofile", &[]);
        assert_eq!(url.as_str(), "http://localhost:7878/api/v3/qualityprofile?apikey=secret");
    }

    #[test]
    fn severity_marker_is_detected() {
        let payload = json!([{ "severity": "error", "errorMessage": "This movie has already been added" }]);
        assert_eq!(
            application_error(&payload).as_deref(),
            Some("This movie has already been added")
        );
        assert_eq!(application_error(&json!({ "id": 1 })), None);
        assert_eq!(application_error(&json!([])), None);
    }

    #[tokio::test]
    async fn get_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/qualityprofile"))
            .and(query_param("apikey", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "name": "Any", "upgradeAllowed": false },
                { "id": 4, "name": "HD-1080p" }
            ])))
            .mount(&server)
            .await;

        let profiles = RemoteClient::new()
            .quality_profiles(&endpoint(&server.uri()))
            .await
            .unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[1], QualityProfile { id: 4, name: "HD-1080p".to_string() });
    }

    #[tokio::test]
    async fn rejected_post_surfaces_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/movie"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!([
                { "propertyName": "TmdbId", "errorMessage": "This movie has already been added", "severity": "error" }
            ])))
            .mount(&server)
            .await;

        let err = RemoteClient::new()
            .post(&endpoint(&server.uri()), "/movie", &json!({ "tmdbId": 603 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Application);
        assert_eq!(err.message, "This movie has already been added");
        assert!(!err.suggests_configuration());
    }

    #[tokio::test]
    async fn successful_status_with_severity_marker_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "severity": "error",
                "errorMessage": "Root folder '/tv' does not exist"
            })))
            .mount(&server)
            .await;

        let err = RemoteClient::new()
            .post(&endpoint(&server.uri()), "/series", &json!({ "tvdbId": 81189 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Application);
        assert_eq!(err.message, "Root folder '/tv' does not exist");
    }

    #[tokio::test]
    async fn add_content_posts_backend_specific_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/movie"))
            .and(body_partial_json(json!({
                "title": "Movie 603",
                "tmdbId": 603,
                "rootFolderPath": "/movies",
                "qualityProfileId": 4
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 42, "title": "The Matrix" })))
            .expect(1)
            .mount(&server)
            .await;

        let created = RemoteClient::new()
            .add_content(&endpoint(&server.uri()), "Movie 603", 603, "/movies", 4)
            .await
            .unwrap();
        assert_eq!(created["id"], 42);
    }

    #[tokio::test]
    async fn start_search_returns_command_id_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .and(body_json(json!({ "name": "MoviesSearch", "movieIds": [42] })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 555 })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "name": "MoviesSearch" })))
            .mount(&server)
            .await;

        let client = RemoteClient::new();
        let ep = endpoint(&server.uri());
        assert_eq!(client.start_search(&ep, 42).await.unwrap(), Some(555));
        assert_eq!(client.start_search(&ep, 42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn http_errors_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = RemoteClient::new()
            .get(&endpoint(&server.uri()), "/qualityprofile", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Http(401));
        assert!(err.suggests_configuration());
    }

    #[tokio::test]
    async fn invalid_json_is_a_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = RemoteClient::new()
            .get(&endpoint(&server.uri()), "/qualityprofile", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Protocol);
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": "queued" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = RemoteClient::with_timeout(Duration::from_millis(50))
            .command_status(&endpoint(&server.uri()), 9)
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_error() {
        // Port 9 (discard) is closed on test hosts.
        let err = RemoteClient::new()
            .get(&endpoint("http://127.0.0.1:9"), "/qualityprofile", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::Connection);
    }

    #[tokio::test]
    async fn command_status_reads_status_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/command/77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 77, "name": "MoviesSearch", "commandName": "Movies Search", "status": "started"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/command/78"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 78 })))
            .mount(&server)
            .await;

        let client = RemoteClient::new();
        let ep = endpoint(&server.uri());
        assert_eq!(client.command_status(&ep, 77).await.unwrap(), CommandStatus::Started);
        assert_eq!(client.command_status(&ep, 78).await.unwrap(), CommandStatus::Unknown);
    }
}
