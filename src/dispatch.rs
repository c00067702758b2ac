use crate::config::PlayersConfig;
use crate::intent::PlayMode;
use crate::kodi::{KodiClient, KodiError};
use crate::resolver::{CanonicalMedia, MediaKind};

/// All playback goes through the TMDB helper addon, which hands the item
/// to the configured player profile.
const PLAYER_PLUGIN_BASE: &str = "plugin://plugin.video.themoviedb.helper/?info=play";

/// Deep-link for a resolved media reference. Pure; the profile is selected
/// by the playback mode.
pub fn build_player_url(media: &CanonicalMedia, mode: PlayMode, players: &PlayersConfig) -> String {
    let profile = match mode {
        PlayMode::Auto => &players.auto,
        PlayMode::Manual => &players.select,
    };

    let base = format!(
        "{}&player={}",
        PLAYER_PLUGIN_BASE,
        urlencoding::encode(profile)
    );

    match media.kind {
        MediaKind::Movie => format!("{}&tmdb_id={}&type=movie", base, media.external_id),
        MediaKind::Show => format!(
            "{}&tmdb_id={}&season={}&episode={}&type=episode",
            base,
            media.external_id,
            media.season.unwrap_or(1),
            media.episode.unwrap_or(1)
        ),
    }
}

/// Playback Dispatcher: builds the deep-link and submits it to the player.
///
/// A transport failure here is a narrow race (the device went away between
/// the gate check and the dispatch) and is not retried within a request.
pub struct Dispatcher {
    kodi: KodiClient,
    players: PlayersConfig,
}

impl Dispatcher {
    pub fn new(kodi: KodiClient, players: PlayersConfig) -> Self {
        Self { kodi, players }
    }

    pub async fn dispatch(&self, media: &CanonicalMedia, mode: PlayMode) -> Result<(), KodiError> {
        let url = build_player_url(media, mode, &self.players);
        self.kodi.play_url(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> PlayersConfig {
        PlayersConfig {
            auto: "fenlight_auto.json".to_string(),
            select: "fenlight_select.json".to_string(),
        }
    }

    fn show(id: u64, season: u32, episode: u32) -> CanonicalMedia {
        CanonicalMedia {
            kind: MediaKind::Show,
            external_id: id,
            title: "Friends".to_string(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    #[test]
    fn test_movie_url() {
        let media = CanonicalMedia {
            kind: MediaKind::Movie,
            external_id: 603,
            title: "The Matrix".to_string(),
            season: None,
            episode: None,
        };

        let url = build_player_url(&media, PlayMode::Auto, &players());
        assert_eq!(
            url,
            "plugin://plugin.video.themoviedb.helper/?info=play&player=fenlight_auto.json&tmdb_id=603&type=movie"
        );
    }

    #[test]
    fn test_episode_url_carries_season_and_episode() {
        let url = build_player_url(&show(1668, 5, 10), PlayMode::Auto, &players());
        assert!(url.contains("tmdb_id=1668"));
        assert!(url.contains("season=5"));
        assert!(url.contains("episode=10"));
        assert!(url.contains("type=episode"));
        assert!(url.contains("player=fenlight_auto.json"));
    }

    #[test]
    fn test_manual_mode_selects_other_profile() {
        let url = build_player_url(&show(1668, 1, 1), PlayMode::Manual, &players());
        assert!(url.contains("player=fenlight_select.json"));
    }
}
