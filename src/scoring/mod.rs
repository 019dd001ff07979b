//! Affinity scoring between a product's tags and a listener's taste.
//!
//! Scorers are pure: the same tags, profile and mode always produce the same `Affinity`, which
//! lets the GA precompute one score per candidate and reuse it across every generation.

pub mod facet;

use crate::catalog::TagSet;
use crate::config::ScoringConfig;
use crate::profile::{PreferenceMode, TasteProfile};

pub use facet::{derive_facet_weights, FacetCardinalityAffinity, FacetWeights};

/// Score of one product under one taste profile and mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affinity {
    pub score: f64,
    pub is_relevant: bool,
}

impl Affinity {
    pub fn new(score: f64) -> Self {
        Self {
            score,
            is_relevant: score > 0.0,
        }
    }

    pub fn none() -> Self {
        Self::new(0.0)
    }
}

/// Maps a product's tag set to an affinity score.
pub trait AffinityModel: Send + Sync {
    fn score(&self, tags: &TagSet, profile: &TasteProfile, mode: &PreferenceMode) -> Affinity;

    fn name(&self) -> &'static str;
}

/// Per-facet weights effective for one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeWeights {
    pub artist: f64,
    pub genre: f64,
}

/// Derives the facet weights a mode actually uses.
///
/// `artist` keeps only the artist weight, `genre` only the genre weight, `balanced` both;
/// an unknown mode gets nothing.
pub fn derive_weights(base: &ScoringConfig, mode: &PreferenceMode) -> ModeWeights {
    let artist = if mode.uses_artists() {
        base.artist_weight
    } else {
        0.0
    };
    let genre = if mode.uses_genres() {
        base.genre_weight
    } else {
        0.0
    };
    ModeWeights { artist, genre }
}

/// Full facet weight on any intersection, regardless of how many tags intersect.
#[derive(Debug, Clone)]
pub struct AnyMatchAffinity {
    base: ScoringConfig,
}

impl AnyMatchAffinity {
    pub fn new(base: &ScoringConfig) -> Self {
        Self { base: base.clone() }
    }
}

impl AffinityModel for AnyMatchAffinity {
    fn score(&self, tags: &TagSet, profile: &TasteProfile, mode: &PreferenceMode) -> Affinity {
        let weights = derive_weights(&self.base, mode);
        let mut score = 0.0;
        if weights.artist > 0.0 && profile.matches_artist(tags) {
            score += weights.artist;
        }
        if weights.genre > 0.0 && profile.matches_genre(tags) {
            score += weights.genre;
        }
        Affinity::new(score)
    }

    fn name(&self) -> &'static str {
        "any_match"
    }
}
