use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

/// French is the primary language of the translation table; any unknown
/// locale or missing key falls back to it.
const FALLBACK_LANG: &str = "fr";

const EMBEDDED_TRANSLATIONS: &str = include_str!("../translations.json");

/// Localized response templates, keyed by language then message key.
///
/// Loaded once at startup and treated as immutable configuration data.
/// Templates use `{}` positional placeholders.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Messages {
    table: HashMap<String, HashMap<String, String>>,
}

impl Messages {
    pub fn load() -> Result<Self, serde_json::Error> {
        serde_json::from_str(EMBEDDED_TRANSLATIONS)
    }

    /// Raw template for `key` in `lang`, falling back to French, then "".
    pub fn get(&self, lang: &str, key: &str) -> &str {
        let lang = if self.table.contains_key(lang) {
            lang
        } else {
            FALLBACK_LANG
        };

        if let Some(text) = self.table.get(lang).and_then(|t| t.get(key)) {
            return text;
        }

        match self.table.get(FALLBACK_LANG).and_then(|t| t.get(key)) {
            Some(text) => text,
            None => {
                warn!(key, "missing translation key");
                ""
            }
        }
    }

    /// Fill the `{}` placeholders of a template in order. Extra arguments
    /// are dropped; missing ones leave the placeholder empty.
    pub fn format(&self, lang: &str, key: &str, args: &[&str]) -> String {
        let template = self.get(lang, key);
        let mut out = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut parts = template.split("{}").peekable();

        while let Some(part) = parts.next() {
            out.push_str(part);
            if parts.peek().is_some() {
                out.push_str(args.next().copied().unwrap_or(""));
            }
        }
        out
    }
}
