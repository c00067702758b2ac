use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const TRAKT_API_URL: &str = "https://api.trakt.tv";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum TraktError {
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
}

/// Next unwatched episode of a show, as reported by the history service.
///
/// Only valid for shows; a movie never carries a resume point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    pub season: u32,
    pub episode: u32,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    show: SearchShow,
}

#[derive(Debug, Deserialize)]
struct SearchShow {
    ids: ShowIds,
}

#[derive(Debug, Deserialize)]
struct ShowIds {
    trakt: u64,
}

#[derive(Debug, Deserialize)]
struct WatchedProgress {
    next_episode: Option<NextEpisode>,
}

#[derive(Debug, Deserialize)]
struct NextEpisode {
    season: u32,
    number: u32,
}

/// Trakt.tv watch-history client.
///
/// Only used for "next up" lookups; scrobbling is the player addon's job.
pub struct TraktClient {
    client: Client,
    base_url: String,
    client_id: String,
    access_token: String,
}

impl TraktClient {
    pub fn new(client_id: String, access_token: String) -> Self {
        Self::with_base_url(client_id, access_token, TRAKT_API_URL)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(client_id: String, access_token: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            client_id,
            access_token,
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .header("Content-Type", "application/json")
            .header("trakt-api-version", "2")
            .header("trakt-api-key", &self.client_id)
            .bearer_auth(&self.access_token)
    }

    /// Trakt's own id for a show known by its TMDB id.
    async fn show_id(&self, tmdb_show_id: u64) -> Result<Option<u64>, TraktError> {
        let url = format!("{}/search/tmdb/{}?type=show", self.base_url, tmdb_show_id);

        let entries: Vec<SearchEntry> = self.get(&url).send().await?.json().await?;

        Ok(entries.first().map(|e| e.show.ids.trakt))
    }

    /// The next unwatched episode per Trakt's watched-progress endpoint.
    ///
    /// `None` means the show has no history entry at all; the semantics are
    /// the service's, never recomputed locally.
    pub async fn next_up(&self, tmdb_show_id: u64) -> Result<Option<ResumePoint>, TraktError> {
        let Some(trakt_id) = self.show_id(tmdb_show_id).await? else {
            debug!(tmdb_show_id, "show unknown to trakt");
            return Ok(None);
        };

        let url = format!("{}/shows/{}/progress/watched", self.base_url, trakt_id);

        let progress: WatchedProgress = self.get(&url).send().await?.json().await?;

        match progress.next_episode {
            Some(next) => {
                info!(
                    tmdb_show_id,
                    season = next.season,
                    episode = next.number,
                    "trakt next up"
                );
                Ok(Some(ResumePoint {
                    season: next.season,
                    episode: next.number,
                }))
            }
            None => {
                debug!(tmdb_show_id, "no watch progress");
                Ok(None)
            }
        }
    }
}
