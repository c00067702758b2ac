use std::cmp::Ordering;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::intent::{Intent, IntentAction};
use crate::tmdb::{SearchResult, TmdbClient, TmdbError};

/// Candidates within 10% of the leader's popularity count as tied; the
/// kind hint then decides, so selection stays deterministic without ever
/// asking the user to disambiguate.
const TIE_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Show,
}

/// Fully resolved, playable media reference.
///
/// season/episode are present iff kind is `Show` and a specific episode
/// was requested or resolved.
#[derive(Debug, Clone)]
pub struct CanonicalMedia {
    pub kind: MediaKind,
    pub external_id: u64,
    pub title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no match for \"{0}\"")]
    NotFound(String),
    #[error("episode not found")]
    EpisodeNotFound,
    #[error(transparent)]
    Tmdb(#[from] TmdbError),
}

/// A media-kind hint spoken as part of the title ("the movie heat",
/// "the office series").
pub fn kind_hint(title_text: &str) -> Option<MediaKind> {
    let movie_re = Regex::new(r"(?i)\b(movie|film)\b").unwrap();
    let show_re = Regex::new(r"(?i)\b(show|series|serie|série)\b").unwrap();

    if movie_re.is_match(title_text) {
        Some(MediaKind::Movie)
    } else if show_re.is_match(title_text) {
        Some(MediaKind::Show)
    } else {
        None
    }
}

fn normalize(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Selection policy over mixed search candidates.
///
/// Exact title matches (after normalization) beat everything else; among
/// the rest, the most popular wins, with a popularity tie broken by the
/// kind hint. Sorting is total (popularity desc, then id) so identical
/// upstream data always yields the same pick.
pub fn select_best(
    candidates: Vec<(SearchResult, MediaKind)>,
    query: &str,
    hint: Option<MediaKind>,
) -> Option<(SearchResult, MediaKind)> {
    if candidates.is_empty() {
        return None;
    }

    let wanted = normalize(query);
    let exact: Vec<(SearchResult, MediaKind)> = candidates
        .iter()
        .filter(|(r, _)| normalize(r.display_title()) == wanted)
        .cloned()
        .collect();

    let mut pool = if exact.is_empty() { candidates } else { exact };

    pool.sort_by(|(a, _), (b, _)| {
        b.popularity
            .partial_cmp(&a.popularity)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    let leader_popularity = pool[0].0.popularity;
    let tie_floor = leader_popularity * TIE_RATIO;

    if let Some(hinted) = hint
        && let Some(pick) = pool
            .iter()
            .take_while(|(r, _)| r.popularity >= tie_floor)
            .find(|(_, kind)| *kind == hinted)
    {
        return Some(pick.clone());
    }

    pool.into_iter().next()
}

/// Media Resolver: free text in, canonical media reference out.
pub struct Resolver {
    tmdb: TmdbClient,
}

impl Resolver {
    pub fn new(tmdb: TmdbClient) -> Self {
        Self { tmdb }
    }

    pub async fn resolve(&self, intent: &Intent) -> Result<CanonicalMedia, ResolveError> {
        let query = intent.title.as_str();
        let locale = intent.lang();

        // Any spoken season or episode, a resume or a latest-episode
        // request can only mean a show; skip the movie search entirely.
        // A lone season means its first episode, a lone episode means
        // season one.
        let explicit_episode = intent.season.is_some() || intent.episode.is_some();
        if explicit_episode || intent.action != IntentAction::Play {
            let shows = self.tmdb.search_tv(query, locale).await?;
            let candidates = shows.into_iter().map(|r| (r, MediaKind::Show)).collect();

            let (result, _) = select_best(candidates, query, None)
                .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;

            let (season, episode) = if explicit_episode && intent.action == IntentAction::Play {
                let season = intent.season.unwrap_or(1);
                let episode = intent.episode.unwrap_or(1);
                if !self.tmdb.episode_exists(result.id, season, episode).await {
                    return Err(ResolveError::EpisodeNotFound);
                }
                (Some(season), Some(episode))
            } else {
                // Resume and latest ignore spoken numbers; the history
                // service or the air dates decide.
                (None, None)
            };

            info!(id = result.id, title = result.display_title(), "resolved show");

            return Ok(CanonicalMedia {
                kind: MediaKind::Show,
                external_id: result.id,
                title: result.display_title().to_string(),
                season,
                episode,
            });
        }

        // Kind is open: search both and let popularity decide.
        let (movies, shows) = tokio::try_join!(
            self.tmdb.search_movie(query, intent.year, locale),
            self.tmdb.search_tv(query, locale)
        )?;

        debug!(
            movies = movies.len(),
            shows = shows.len(),
            query,
            "search candidates"
        );

        let candidates: Vec<(SearchResult, MediaKind)> = movies
            .into_iter()
            .map(|r| (r, MediaKind::Movie))
            .chain(shows.into_iter().map(|r| (r, MediaKind::Show)))
            .collect();

        let (result, kind) = select_best(candidates, query, kind_hint(query))
            .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;

        info!(id = result.id, title = result.display_title(), ?kind, "resolved");

        Ok(CanonicalMedia {
            kind,
            external_id: result.id,
            title: result.display_title().to_string(),
            season: None,
            episode: None,
        })
    }

    /// Latest aired episode of a show, used when starting a show with no
    /// history to land on instead of guessing.
    pub async fn last_aired(&self, tv_id: u64) -> Result<Option<(u32, u32)>, ResolveError> {
        Ok(self.tmdb.last_aired(tv_id).await?)
    }
}
