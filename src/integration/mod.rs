use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const PLAYER_FILE: &str = "helparr.json";
const PLUGIN_URL: &str = "plugin://plugin.module.helparr/";

/// Player definition read by the browsing add-on to route "add" actions here.
#[derive(Debug, Serialize)]
struct PlayerDefinition {
    name: &'static str,
    plugin: &'static str,
    priority: u32,
    play_movie: String,
    play_episode: String,
    is_resolvable: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStatus {
    Installed(PathBuf),
    AlreadyInstalled(PathBuf),
}

fn player_definition() -> PlayerDefinition {
    PlayerDefinition {
        name: "Add with Helparr",
        plugin: "plugin.module.helparr",
        priority: 1000,
        play_movie: format!("{}?movie={{tmdb}}", PLUGIN_URL),
        play_episode: format!("{}?tvshow={{tvdb}}", PLUGIN_URL),
        is_resolvable: "true",
    }
}

/// Writes the player file once. An existing file is left alone.
pub fn install_integration(dir: &Path) -> Result<InstallStatus> {
    let path = dir.join(PLAYER_FILE);
    if path.exists() {
        info!("Integration already installed at {}", path.display());
        return Ok(InstallStatus::AlreadyInstalled(path));
    }

    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(&player_definition())?;
    fs::write(&path, json)?;
    info!("Installed integration at {}", path.display());
    Ok(InstallStatus::Installed(path))
}
