use crate::config::{BackendSettings, Configuration};
use crate::error::{ConfigError, HelparrError, Result};
use crate::http::{Endpoint, RemoteClient};
use crate::models::{AddedContent, BackendTarget, ContentRequest, SearchPolicy, SubmittedCommand};
use crate::monitor::{MonitorHandle, MonitorSettings, ProgressMonitor};
use crate::notify::{ask, Interaction, OutcomeNotifier};
use crate::profiles::{resolve_profile_id, ProfileCache};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// How an add request ended, when it did not fail.
pub enum SubmitOutcome {
    /// Added without searching.
    Added(AddedContent),
    /// Search accepted, but the backend gave no job id to follow.
    SearchSubmitted(AddedContent),
    /// Search accepted and a monitor is following it.
    SearchStarted(MonitorHandle),
    /// Added, but the backend refused the search command.
    SearchNotStarted {
        content: AddedContent,
        error: HelparrError,
    },
}

pub struct CommandSubmitter {
    client: RemoteClient,
    cache: ProfileCache,
    interaction: Arc<dyn Interaction>,
    notifier: OutcomeNotifier,
    monitor_settings: Option<MonitorSettings>,
}

impl CommandSubmitter {
    pub fn new(
        client: RemoteClient,
        cache: ProfileCache,
        interaction: Arc<dyn Interaction>,
        notifier: OutcomeNotifier,
    ) -> Self {
        Self {
            client,
            cache,
            interaction,
            notifier,
            monitor_settings: None,
        }
    }

    /// Overrides the poll interval and budget taken from the backend settings.
    pub fn with_monitor_settings(mut self, settings: MonitorSettings) -> Self {
        self.monitor_settings = Some(settings);
        self
    }

    /// Handles one request from the host, reporting failures through the notifier.
    pub async fn submit(
        &self,
        config: &Configuration,
        request: &ContentRequest,
    ) -> Result<SubmitOutcome> {
        let result = self.try_submit(config, request).await;
        if let Err(ref e) = result {
            error!("Failed to add {} {}: {}", request.target.content_noun(), request.external_id, e);
            self.notifier.add_failed(request.target, e);
        }
        result
    }

    async fn try_submit(
        &self,
        config: &Configuration,
        request: &ContentRequest,
    ) -> Result<SubmitOutcome> {
        let target = request.target;
        let settings = config.backend(target)?;
        let endpoint = Endpoint::new(target, settings)?;
        let root_folder = settings.root_folder(target)?;
        let quality_profile_id = resolve_profile_id(
            &self.cache,
            target,
            settings.quality_profile_policy.as_deref(),
            &self.interaction,
        )
        .await?;

        self.add_and_maybe_search(
            settings,
            &endpoint,
            request.external_id,
            root_folder,
            quality_profile_id,
        )
        .await
    }

    /// Adds the content, then searches for it according to the `searchMode` setting.
    ///
    /// A started search is handed to a spawned [`ProgressMonitor`]; this returns
    /// without waiting for it.
    #[instrument(skip(self, settings, endpoint), fields(target = %endpoint.target()))]
    pub async fn add_and_maybe_search(
        &self,
        settings: &BackendSettings,
        endpoint: &Endpoint,
        external_id: i64,
        root_folder: &str,
        quality_profile_id: i64,
    ) -> Result<SubmitOutcome> {
        let target = endpoint.target();
        let root_folder = root_folder.trim();
        if root_folder.is_empty() {
            return Err(ConfigError::MissingField {
                target,
                field: "root folder",
            }
            .into());
        }

        info!(
            "Adding {} {} to {} (profile {}, root folder {})",
            target.content_noun(),
            external_id,
            target,
            quality_profile_id,
            root_folder
        );

        let title = synthesized_title(target, external_id);
        let payload = self
            .client
            .add_content(endpoint, &title, external_id, root_folder, quality_profile_id)
            .await?;
        let content = added_content(&payload, target, external_id);
        info!("Added {} (id {})", content.title, content.id);

        let search = match SearchPolicy::from_setting(settings.search_mode.as_deref()) {
            SearchPolicy::Always => true,
            SearchPolicy::Never => false,
            SearchPolicy::Ask => {
                let title = content.title.clone();
                ask(&self.interaction, move |i| i.confirm_search(&title), false).await
            }
        };
        if !search {
            self.notifier.added(target, &content, false);
            return Ok(SubmitOutcome::Added(content));
        }

        let command_id = match self.client.start_search(endpoint, content.id).await {
            Ok(Some(command_id)) => command_id,
            Ok(None) => {
                warn!("{} accepted the search without a command id", target);
                self.notifier.added(target, &content, true);
                return Ok(SubmitOutcome::SearchSubmitted(content));
            }
            Err(e) => {
                error!("{} refused the search for {}: {}", target, content.title, e);
                let error = HelparrError::from(e);
                self.notifier.search_not_started(target, &content, &error);
                return Ok(SubmitOutcome::SearchNotStarted { content, error });
            }
        };

        self.notifier.search_started(target, &content);
        let monitor = ProgressMonitor::new(
            Arc::new(self.client.clone()),
            endpoint.clone(),
            SubmittedCommand::new(target, command_id, content.title.clone()),
            self.monitor_settings
                .unwrap_or_else(|| MonitorSettings::from_backend(settings)),
            self.interaction.clone(),
            self.notifier.clone(),
        );
        Ok(SubmitOutcome::SearchStarted(monitor.spawn()))
    }
}

/// Title used in the add body and when the backend's response has none.
pub fn synthesized_title(target: BackendTarget, external_id: i64) -> String {
    match target {
        BackendTarget::Movie => format!("Movie {}", external_id),
        BackendTarget::Series => format!("Series {}", external_id),
    }
}

/// Monitoring keys off this id, so the external id stands in when the backend omits it.
pub fn added_content(payload: &Value, target: BackendTarget, external_id: i64) -> AddedContent {
    let id = payload
        .get("id")
        .and_then(Value::as_i64)
        .unwrap_or(external_id);
    let title = payload
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| synthesized_title(target, external_id));
    AddedContent { id, title }
}
