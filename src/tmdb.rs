use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// TMDB answers fast; a hung request should not stall a voice reply.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum TmdbError {
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: u64,
    pub title: Option<String>, // Movies
    pub name: Option<String>,  // TV shows
    pub release_date: Option<String>,   // Movies
    pub first_air_date: Option<String>, // TV shows
    #[serde(default)]
    pub popularity: f64,
}

impl SearchResult {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn year(&self) -> Option<u16> {
        let date = self
            .release_date
            .as_deref()
            .or(self.first_air_date.as_deref())?;
        date.split('-').next()?.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct TvDetails {
    last_episode_to_air: Option<AiredEpisode>,
}

#[derive(Debug, Deserialize)]
struct AiredEpisode {
    season_number: u32,
    episode_number: u32,
}

/// TMDB language tag for an assistant locale. Only the returned display
/// strings depend on it, never selection.
pub fn api_language(locale: &str) -> &'static str {
    if locale.starts_with("fr") {
        "fr-FR"
    } else {
        "en-US"
    }
}

#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, "https://api.themoviedb.org")
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// Search for movies only
    pub async fn search_movie(
        &self,
        query: &str,
        year: Option<u16>,
        locale: &str,
    ) -> Result<Vec<SearchResult>, TmdbError> {
        let mut url = format!(
            "{}/3/search/movie?api_key={}&query={}&language={}",
            self.base_url,
            self.api_key,
            urlencoding::encode(query),
            api_language(locale)
        );

        if let Some(y) = year {
            url.push_str(&format!("&year={}", y));
        }

        debug!(query, "searching TMDB movies");

        let response: SearchResponse = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        Ok(response.results)
    }

    /// Search for TV shows only
    pub async fn search_tv(
        &self,
        query: &str,
        locale: &str,
    ) -> Result<Vec<SearchResult>, TmdbError> {
        let url = format!(
            "{}/3/search/tv?api_key={}&query={}&language={}",
            self.base_url,
            self.api_key,
            urlencoding::encode(query),
            api_language(locale)
        );

        debug!(query, "searching TMDB shows");

        let response: SearchResponse = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        Ok(response.results)
    }

    /// Whether a specific episode exists for a show.
    ///
    /// Fails open: a transport error must not block playback of an episode
    /// the user explicitly asked for.
    pub async fn episode_exists(&self, tv_id: u64, season: u32, episode: u32) -> bool {
        let url = format!(
            "{}/3/tv/{}/season/{}/episode/{}?api_key={}",
            self.base_url, tv_id, season, episode, self.api_key
        );

        match self.client.get(&url).timeout(REQUEST_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(tv_id, season, episode, error = %e, "episode check failed, assuming it exists");
                true
            }
        }
    }

    /// Latest aired (season, episode) of a show, if TMDB knows one.
    pub async fn last_aired(&self, tv_id: u64) -> Result<Option<(u32, u32)>, TmdbError> {
        let url = format!("{}/3/tv/{}?api_key={}", self.base_url, tv_id, self.api_key);

        debug!(tv_id, "fetching TV details");

        let response: TvDetails = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        Ok(response
            .last_episode_to_air
            .map(|e| (e.season_number, e.episode_number)))
    }
}
