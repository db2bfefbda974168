use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SonarrSeries<'a> {
    title: &'a str,
    #[serde(rename = "qualityProfileId")]
    quality_profile_id: i64,
    #[serde(rename = "tvdbId")]
    tvdb_id: i64,
    #[serde(rename = "rootFolderPath")]
    root_folder_path: &'a str,
    monitored: bool,
    #[serde(rename = "seasonFolder")]
    season_folder: bool,
    #[serde(rename = "addOptions")]
    add_options: SonarrAddOptions,
}

#[derive(Debug, Serialize)]
struct SonarrAddOptions {
    #[serde(rename = "searchForMissingEpisodes")]
    search_for_missing_episodes: bool,
}

pub fn add_series<'a>(
    title: &'a str,
    tvdb_id: i64,
    root_folder_path: &'a str,
    quality_profile_id: i64,
) -> SonarrSeries<'a> {
    SonarrSeries {
        title,
        quality_profile_id,
        tvdb_id,
        root_folder_path,
        monitored: true,
        season_folder: true,
        add_options: SonarrAddOptions {
            search_for_missing_episodes: false,
        },
    }
}

/// Sonarr's search command takes a single series id, unlike Radarr's list.
#[derive(Debug, Serialize)]
pub struct SeriesSearchCommand {
    name: &'static str,
    #[serde(rename = "seriesId")]
    series_id: i64,
}

pub fn series_search(series_id: i64) -> SeriesSearchCommand {
    SeriesSearchCommand {
        name: "SeriesSearch",
        series_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_body_matches_sonarr_contract() {
        let body = serde_json::to_value(add_series("Series 81189", 81189, "/tv", 4)).unwrap();
        assert_eq!(body["tvdbId"], 81189);
        assert_eq!(body["qualityProfileId"], 4);
        assert_eq!(body["rootFolderPath"], "/tv");
        assert_eq!(body["addOptions"]["searchForMissingEpisodes"], false);
    }

    #[test]
    fn search_uses_single_id() {
        let body = serde_json::to_value(series_search(7)).unwrap();
        assert_eq!(body, json!({ "name": "SeriesSearch", "seriesId": 7 }));
    }
}
