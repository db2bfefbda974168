//! Local cache of backend quality profiles and the dropdown index map built from them.
//!
//! Each target has one JSON document holding both the profile list and the
//! selection map. A refresh writes the document to a temporary file and renames
//! it into place, so readers see either the old pair or the new pair.

use crate::error::{HelparrError, Result};
use crate::http::{Endpoint, RemoteClient};
use crate::models::{BackendTarget, QualityProfile};
use crate::notify::{ask, Interaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Profile id used when the selection map cannot answer.
pub const DEFAULT_PROFILE_ID: i64 = 1;

/// Dropdown index to backend profile id. Index 0 ("ask") is never stored.
pub type SelectionMap = BTreeMap<u32, i64>;

#[derive(Debug, Serialize, Deserialize)]
struct CachedProfiles {
    #[serde(rename = "refreshedAt")]
    refreshed_at: DateTime<Utc>,
    profiles: Vec<QualityProfile>,
    selection: SelectionMap,
}

#[derive(Debug, Clone)]
pub struct ProfileCache {
    data_dir: PathBuf,
}

impl ProfileCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn cache_path(&self, target: BackendTarget) -> PathBuf {
        self.data_dir
            .join(format!("{}_profiles.json", target.cache_key()))
    }

    /// Settings fragment for the host's dropdown.
    pub fn option_list_path(&self, target: BackendTarget) -> PathBuf {
        self.data_dir
            .join(format!("{}_profiles.xml", target.cache_key()))
    }

    /// Fetches the profile list and replaces the cached list and selection map together.
    ///
    /// The dropdown file is derived from the cache and rewritten afterwards; a
    /// failure there is logged and does not fail the refresh. Callers serialize refreshes per target; two concurrent refreshes of the
    /// same target race on the final rename.
    #[instrument(skip(self, client, endpoint), fields(target = %endpoint.target()))]
    pub async fn refresh(&self, client: &RemoteClient, endpoint: &Endpoint) -> Result<usize> {
        let target = endpoint.target();
        let profiles = client.quality_profiles(endpoint).await?;

        let document = CachedProfiles {
            refreshed_at: Utc::now(),
            selection: selection_map(&profiles),
            profiles,
        };

        fs::create_dir_all(&self.data_dir)?;
        write_atomically(
            &self.cache_path(target),
            &serde_json::to_vec_pretty(&document)?,
        )?;
        let options = self.option_list_path(target);
        if let Err(e) = write_atomically(&options, render_option_list(&document.profiles).as_bytes()) {
            warn!("Failed to write {} profile options to {}: {}", target, options.display(), e);
        }

        info!(
            "Cached {} {} quality profiles",
            document.profiles.len(),
            target
        );
        Ok(document.profiles.len())
    }

    fn load(&self, target: BackendTarget) -> Option<CachedProfiles> {
        let path = self.cache_path(target);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("No cached profiles at {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!("Ignoring unreadable profile cache {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Last successfully cached profiles, in backend order. Never touches the network.
    pub fn load_cached(&self, target: BackendTarget) -> Vec<QualityProfile> {
        self.load(target).map(|d| d.profiles).unwrap_or_default()
    }

    pub fn selection_map(&self, target: BackendTarget) -> Option<SelectionMap> {
        self.load(target).map(|d| d.selection)
    }

    /// `None` for index 0, meaning the caller has to ask.
    pub fn resolve_selection(&self, target: BackendTarget, index: u32) -> Option<i64> {
        if index == 0 {
            return None;
        }
        let mapped = self
            .selection_map(target)
            .and_then(|map| map.get(&index).copied());
        Some(mapped.unwrap_or_else(|| {
            warn!(
                "No {} profile mapped for setting {}, using default id {}",
                target, index, DEFAULT_PROFILE_ID
            );
            DEFAULT_PROFILE_ID
        }))
    }
}

/// Index n maps to the (n-1)-th profile in fetch order.
pub fn selection_map(profiles: &[QualityProfile]) -> SelectionMap {
    profiles
        .iter()
        .enumerate()
        .map(|(i, p)| (i as u32 + 1, p.id))
        .collect()
}

/// Dropdown options for the host settings screen: "Ask" first, then one per profile.
pub fn render_option_list(profiles: &[QualityProfile]) -> String {
    let mut out = String::from("<options>\n    <option label=\"Ask\">0</option>\n");
    for (index, profile) in profiles.iter().enumerate() {
        out.push_str(&format!(
            "    <option label=\"{}\">{}</option>\n",
            escape_xml(&profile.name),
            index + 1
        ));
    }
    out.push_str("</options>\n");
    out
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
    fs::write(&tmp, contents)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Turns the `qualityProfilePolicy` setting into a profile id.
///
/// Setting "0" (or anything unparseable) asks the user, but only when there are
/// cached profiles to choose from; with an empty cache the default id is used.
pub async fn resolve_profile_id(
    cache: &ProfileCache,
    target: BackendTarget,
    setting: Option<&str>,
    interaction: &Arc<dyn Interaction>,
) -> Result<i64> {
    let index = setting
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0);

    if let Some(id) = cache.resolve_selection(target, index) {
        return Ok(id);
    }

    let profiles = cache.load_cached(target);
    if profiles.is_empty() {
        warn!(
            "No cached {} profiles to choose from, using default id {}",
            target, DEFAULT_PROFILE_ID
        );
        return Ok(DEFAULT_PROFILE_ID);
    }

    ask(interaction, move |i| i.choose_profile(target, &profiles), None)
        .await
        .ok_or(HelparrError::NoProfileSelected)
}
