use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::catalog::TagSet;

/// A listener's taste, as four sets of canonical tokens (`black_metal`, `tool`, ...).
///
/// Field names on the wire follow the taste-profile API: `artists` and `genres` are the
/// long-term favourites, `recent_*` the short-term ones. A token present in both the top and
/// the recent set of a facet signals stronger affinity than one present in only one of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    #[serde(rename = "artists", default)]
    pub top_artists: BTreeSet<String>,
    #[serde(rename = "genres", default)]
    pub top_genres: BTreeSet<String>,
    #[serde(default)]
    pub recent_artists: BTreeSet<String>,
    #[serde(default)]
    pub recent_genres: BTreeSet<String>,
}

impl TasteProfile {
    pub fn new<I, S>(top_artists: I, top_genres: I, recent_artists: I, recent_genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            top_artists: top_artists.into_iter().map(Into::into).collect(),
            top_genres: top_genres.into_iter().map(Into::into).collect(),
            recent_artists: recent_artists.into_iter().map(Into::into).collect(),
            recent_genres: recent_genres.into_iter().map(Into::into).collect(),
        }
    }

    /// True when the product carries at least one top or recent artist.
    pub fn matches_artist(&self, tags: &TagSet) -> bool {
        tags.iter()
            .any(|t| self.top_artists.contains(t) || self.recent_artists.contains(t))
    }

    /// True when the product carries at least one top or recent genre.
    pub fn matches_genre(&self, tags: &TagSet) -> bool {
        tags.iter()
            .any(|t| self.top_genres.contains(t) || self.recent_genres.contains(t))
    }

    pub fn is_empty(&self) -> bool {
        self.top_artists.is_empty()
            && self.top_genres.is_empty()
            && self.recent_artists.is_empty()
            && self.recent_genres.is_empty()
    }
}

/// Selects how affinity is weighted and which facet defines relevance.
///
/// Parsing never fails: an unrecognised mode is kept as `Unknown` and matches nothing, so a
/// typo degrades a run to zero affinity instead of aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PreferenceMode {
    Artist,
    Genre,
    Balanced,
    Unknown(String),
}

impl PreferenceMode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "artist" => PreferenceMode::Artist,
            "genre" => PreferenceMode::Genre,
            "balanced" => PreferenceMode::Balanced,
            _ => PreferenceMode::Unknown(raw.to_string()),
        }
    }

    /// Does the artist facet count towards relevance in this mode
    pub fn uses_artists(&self) -> bool {
        matches!(self, PreferenceMode::Artist | PreferenceMode::Balanced)
    }

    /// Does the genre facet count towards relevance in this mode
    pub fn uses_genres(&self) -> bool {
        matches!(self, PreferenceMode::Genre | PreferenceMode::Balanced)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, PreferenceMode::Unknown(_))
    }

    /// The relevance rule shared by the GA's relevant index and the evaluation harness.
    pub fn is_relevant(&self, tags: &TagSet, profile: &TasteProfile) -> bool {
        (self.uses_artists() && profile.matches_artist(tags))
            || (self.uses_genres() && profile.matches_genre(tags))
    }
}

impl Default for PreferenceMode {
    fn default() -> Self {
        PreferenceMode::Balanced
    }
}

impl From<String> for PreferenceMode {
    fn from(raw: String) -> Self {
        PreferenceMode::parse(&raw)
    }
}

impl From<PreferenceMode> for String {
    fn from(mode: PreferenceMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for PreferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceMode::Artist => write!(f, "artist"),
            PreferenceMode::Genre => write!(f, "genre"),
            PreferenceMode::Balanced => write!(f, "balanced"),
            PreferenceMode::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}
