use serde::{Deserialize, Serialize};

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentAction {
    /// Start playback of a movie or a specific episode.
    Play,
    /// Continue a show at the next unwatched episode.
    Resume,
    /// Play the most recently aired episode of a show.
    Latest,
}

/// Which player profile handles the deep-link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// The player picks a source by itself.
    #[default]
    Auto,
    /// The user picks the source on screen.
    Manual,
}

/// Normalized voice command, as delivered by the voice front-end.
///
/// Immutable once received; one `Intent` drives exactly one pipeline run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Intent {
    pub action: IntentAction,
    /// Free-text title as spoken, e.g. "breaking bad" or "the movie heat".
    pub title: String,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
    /// Release year, when the user spoke one ("play Dune from 2021").
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub mode: PlayMode,
    /// BCP 47 tag from the assistant, e.g. "fr-FR".
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "fr-FR".to_string()
}

impl Intent {
    /// Two-letter language code used for response lookup.
    pub fn lang(&self) -> &str {
        self.locale.split('-').next().unwrap_or("fr")
    }
}

/// What goes back to the voice front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpokenResponse {
    pub speech: String,
    pub end_session: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_deserializes_with_defaults() {
        let intent: Intent =
            serde_json::from_str(r#"{"action": "play", "title": "avatar"}"#).unwrap();
        assert_eq!(intent.action, IntentAction::Play);
        assert_eq!(intent.title, "avatar");
        assert_eq!(intent.season, None);
        assert_eq!(intent.mode, PlayMode::Auto);
        assert_eq!(intent.locale, "fr-FR");
    }

    #[test]
    fn test_intent_lang() {
        let intent: Intent = serde_json::from_str(
            r#"{"action": "resume", "title": "dark", "locale": "en-GB", "mode": "manual"}"#,
        )
        .unwrap();
        assert_eq!(intent.lang(), "en");
        assert_eq!(intent.mode, PlayMode::Manual);
    }
}
