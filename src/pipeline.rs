use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::device::{DeviceState, ReachabilityGate};
use crate::dispatch::Dispatcher;
use crate::intent::{Intent, IntentAction, PlayMode, SpokenResponse};
use crate::kodi::KodiError;
use crate::locale::Messages;
use crate::resolver::{CanonicalMedia, MediaKind, ResolveError, Resolver};
use crate::tmdb::TmdbError;
use crate::trakt::{TraktClient, TraktError};

/// Every failure kind the front-end may have to phrase. All are terminal
/// for the request; nothing here is retried automatically.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("device unreachable")]
    DeviceUnreachable,
    #[error("no match for \"{0}\"")]
    NotFound(String),
    #[error("episode not found")]
    EpisodeNotFound,
    #[error("no watch progress for \"{0}\"")]
    NoProgress(String),
    #[error("watch history is not configured")]
    HistoryUnavailable,
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] KodiError),
    #[error("metadata lookup failed: {0}")]
    Metadata(#[from] TmdbError),
    #[error("history lookup failed: {0}")]
    History(#[from] TraktError),
}

impl From<ResolveError> for PipelineError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::NotFound(title) => PipelineError::NotFound(title),
            ResolveError::EpisodeNotFound => PipelineError::EpisodeNotFound,
            ResolveError::Tmdb(e) => PipelineError::Metadata(e),
        }
    }
}

/// What playback was started, for phrasing the confirmation.
#[derive(Debug, Clone)]
pub struct Playback {
    pub media: CanonicalMedia,
    pub mode: PlayMode,
}

/// Command Orchestration Pipeline.
///
/// One intent runs start-to-finish through Gate → Resolve → Merge →
/// Dispatch, strictly in that order. Requests may overlap; the only shared
/// mutable state between them is the adb session mutex inside the gate's
/// device link.
pub struct Pipeline {
    gate: ReachabilityGate,
    resolver: Resolver,
    history: Option<TraktClient>,
    dispatcher: Dispatcher,
    messages: Arc<Messages>,
}

impl Pipeline {
    pub fn new(
        gate: ReachabilityGate,
        resolver: Resolver,
        history: Option<TraktClient>,
        dispatcher: Dispatcher,
        messages: Arc<Messages>,
    ) -> Self {
        Self {
            gate,
            resolver,
            history,
            dispatcher,
            messages,
        }
    }

    pub async fn run(&self, intent: &Intent) -> Result<Playback, PipelineError> {
        info!(action = ?intent.action, title = %intent.title, "pipeline start");

        if self.gate.ensure_ready().await != DeviceState::Ready {
            return Err(PipelineError::DeviceUnreachable);
        }

        let mut media = self.resolver.resolve(intent).await?;

        match intent.action {
            IntentAction::Resume => {
                let history = self
                    .history
                    .as_ref()
                    .ok_or(PipelineError::HistoryUnavailable)?;

                match history.next_up(media.external_id).await? {
                    Some(point) => {
                        media.season = Some(point.season);
                        media.episode = Some(point.episode);
                    }
                    None => return Err(PipelineError::NoProgress(media.title.clone())),
                }
            }
            IntentAction::Latest => match self.resolver.last_aired(media.external_id).await? {
                Some((season, episode)) => {
                    media.season = Some(season);
                    media.episode = Some(episode);
                }
                None => return Err(PipelineError::EpisodeNotFound),
            },
            IntentAction::Play => {
                // A show named without an episode starts from the beginning.
                if media.kind == MediaKind::Show && media.season.is_none() {
                    media.season = Some(1);
                    media.episode = Some(1);
                }
            }
        }

        self.dispatcher.dispatch(&media, intent.mode).await?;

        info!(
            id = media.external_id,
            title = %media.title,
            "pipeline done"
        );

        Ok(Playback {
            media,
            mode: intent.mode,
        })
    }

    /// Run the pipeline and phrase the outcome for the voice front-end.
    pub async fn handle(&self, intent: &Intent) -> SpokenResponse {
        let lang = intent.lang();

        let speech = match self.run(intent).await {
            Ok(playback) => {
                let manual = if playback.mode == PlayMode::Manual {
                    self.messages.get(lang, "manual_select").to_string()
                } else {
                    String::new()
                };

                let title = playback.media.title.as_str();
                let season = playback.media.season.unwrap_or(1).to_string();
                let episode = playback.media.episode.unwrap_or(1).to_string();

                match (intent.action, playback.media.kind) {
                    (_, MediaKind::Movie) => {
                        self.messages.format(lang, "launch_movie", &[title, &manual])
                    }
                    (IntentAction::Resume, MediaKind::Show) => self.messages.format(
                        lang,
                        "resume_show",
                        &[title, &season, &episode, &manual],
                    ),
                    (IntentAction::Latest, MediaKind::Show) => self.messages.format(
                        lang,
                        "launch_latest",
                        &[title, &season, &episode, &manual],
                    ),
                    (IntentAction::Play, MediaKind::Show) => self.messages.format(
                        lang,
                        "launch_show",
                        &[title, &season, &episode, &manual],
                    ),
                }
            }
            Err(e) => {
                warn!(error = %e, title = %intent.title, "pipeline failed");
                match &e {
                    PipelineError::DeviceUnreachable => {
                        self.messages.format(lang, "device_offline", &[])
                    }
                    PipelineError::NotFound(title) => {
                        self.messages.format(lang, "not_found", &[title])
                    }
                    PipelineError::EpisodeNotFound => {
                        self.messages.format(lang, "episode_not_found", &[])
                    }
                    PipelineError::NoProgress(title) => {
                        self.messages.format(lang, "no_progress", &[title])
                    }
                    PipelineError::HistoryUnavailable => {
                        self.messages.format(lang, "no_history", &[])
                    }
                    PipelineError::Dispatch(_) => {
                        self.messages.format(lang, "playback_failed", &[])
                    }
                    PipelineError::Metadata(_) | PipelineError::History(_) => {
                        self.messages.format(lang, "service_error", &[])
                    }
                }
            }
        };

        SpokenResponse {
            speech,
            end_session: true,
        }
    }
}
