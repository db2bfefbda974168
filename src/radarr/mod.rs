use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RadarrMovie<'a> {
    title: &'a str,
    #[serde(rename = "qualityProfileId")]
    quality_profile_id: i64,
    #[serde(rename = "tmdbId")]
    tmdb_id: i64,
    #[serde(rename = "rootFolderPath")]
    root_folder_path: &'a str,
    monitored: bool,
    #[serde(rename = "addOptions")]
    add_options: RadarrAddOptions,
}

#[derive(Debug, Serialize)]
struct RadarrAddOptions {
    #[serde(rename = "searchForMovie")]
    search_for_movie: bool,
}

/// Search is triggered as a separate command so it can be monitored.
pub fn add_movie<'a>(
    title: &'a str,
    tmdb_id: i64,
    root_folder_path: &'a str,
    quality_profile_id: i64,
) -> RadarrMovie<'a> {
    RadarrMovie {
        title,
        quality_profile_id,
        tmdb_id,
        root_folder_path,
        monitored: true,
        add_options: RadarrAddOptions {
            search_for_movie: false,
        },
    }
}

/// Radarr's search command takes a list of movie ids.
#[derive(Debug, Serialize)]
pub struct MoviesSearchCommand {
    name: &'static str,
    #[serde(rename = "movieIds")]
    movie_ids: Vec<i64>,
}

pub fn movies_search(movie_id: i64) -> MoviesSearchCommand {
    MoviesSearchCommand {
        name: "MoviesSearch",
        movie_ids: vec![movie_id],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_body_matches_radarr_contract() {
        let body = serde_json::to_value(add_movie("Movie 603", 603, "/movies", 1)).unwrap();
        assert_eq!(
            body,
            json!({
                "title": "Movie 603",
                "qualityProfileId": 1,
                "tmdbId": 603,
                "rootFolderPath": "/movies",
                "monitored": true,
                "addOptions": { "searchForMovie": false }
            })
        );
    }

    #[test]
    fn search_uses_id_list() {
        let body = serde_json::to_value(movies_search(42)).unwrap();
        assert_eq!(body, json!({ "name": "MoviesSearch", "movieIds": [42] }));
    }
}
