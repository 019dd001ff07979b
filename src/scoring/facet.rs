use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Affinity, AffinityModel};
use crate::catalog::TagSet;
use crate::profile::{PreferenceMode, TasteProfile};

/// Weights of the cardinality model, one per (facet, top/recent overlap) bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacetWeights {
    pub shared_genres: f64,
    pub shared_artists: f64,
    pub only_top_genres: f64,
    pub only_top_artists: f64,
    pub only_recent_genres: f64,
    pub only_recent_artists: f64,
}

impl Default for FacetWeights {
    fn default() -> Self {
        Self {
            shared_genres: 10.0,
            shared_artists: 12.0,
            only_top_genres: 6.0,
            only_top_artists: 8.0,
            only_recent_genres: 3.0,
            only_recent_artists: 4.0,
        }
    }
}

impl FacetWeights {
    fn zero() -> Self {
        Self {
            shared_genres: 0.0,
            shared_artists: 0.0,
            only_top_genres: 0.0,
            only_top_artists: 0.0,
            only_recent_genres: 0.0,
            only_recent_artists: 0.0,
        }
    }

    pub fn values(&self) -> [f64; 6] {
        [
            self.shared_genres,
            self.shared_artists,
            self.only_top_genres,
            self.only_top_artists,
            self.only_recent_genres,
            self.only_recent_artists,
        ]
    }
}

fn boost(weight: f64) -> f64 {
    weight * 2.0
}

fn damp(weight: f64) -> f64 {
    (weight / 2.0).floor().max(1.0)
}

/// Returns the weights for `mode` without touching `base`.
///
/// `artist` doubles the artist buckets and halves the genre buckets (never below 1), `genre`
/// does the opposite, `balanced` keeps `base`, and an unknown mode zeroes everything.
pub fn derive_facet_weights(base: &FacetWeights, mode: &PreferenceMode) -> FacetWeights {
    match mode {
        PreferenceMode::Artist => FacetWeights {
            shared_artists: boost(base.shared_artists),
            only_top_artists: boost(base.only_top_artists),
            only_recent_artists: boost(base.only_recent_artists),
            shared_genres: damp(base.shared_genres),
            only_top_genres: damp(base.only_top_genres),
            only_recent_genres: damp(base.only_recent_genres),
        },
        PreferenceMode::Genre => FacetWeights {
            shared_genres: boost(base.shared_genres),
            only_top_genres: boost(base.only_top_genres),
            only_recent_genres: boost(base.only_recent_genres),
            shared_artists: damp(base.shared_artists),
            only_top_artists: damp(base.only_top_artists),
            only_recent_artists: damp(base.only_recent_artists),
        },
        PreferenceMode::Balanced => *base,
        PreferenceMode::Unknown(_) => FacetWeights::zero(),
    }
}

/// Tag counts per overlap bucket for one facet
#[derive(Debug, Default, PartialEq)]
struct FacetOverlap {
    shared: usize,
    only_top: usize,
    only_recent: usize,
}

fn overlap(tags: &TagSet, top: &BTreeSet<String>, recent: &BTreeSet<String>) -> FacetOverlap {
    tags.iter()
        .fold(FacetOverlap::default(), |mut acc, tag| {
            match (top.contains(tag), recent.contains(tag)) {
                (true, true) => acc.shared += 1,
                (true, false) => acc.only_top += 1,
                (false, true) => acc.only_recent += 1,
                (false, false) => {}
            }
            acc
        })
}

/// Weights every matching tag by whether it sits in the top set, the recent set, or both.
///
/// Unlike `AnyMatchAffinity`, two matching tags score twice as much as one, and in the
/// exclusive modes the off-facet still contributes with damped weights.
#[derive(Debug, Clone)]
pub struct FacetCardinalityAffinity {
    base: FacetWeights,
}

impl FacetCardinalityAffinity {
    pub fn new(base: FacetWeights) -> Self {
        Self { base }
    }
}

impl AffinityModel for FacetCardinalityAffinity {
    fn score(&self, tags: &TagSet, profile: &TasteProfile, mode: &PreferenceMode) -> Affinity {
        let w = derive_facet_weights(&self.base, mode);
        let artists = overlap(tags, &profile.top_artists, &profile.recent_artists);
        let genres = overlap(tags, &profile.top_genres, &profile.recent_genres);

        let score = genres.shared as f64 * w.shared_genres
            + artists.shared as f64 * w.shared_artists
            + genres.only_top as f64 * w.only_top_genres
            + artists.only_top as f64 * w.only_top_artists
            + genres.only_recent as f64 * w.only_recent_genres
            + artists.only_recent as f64 * w.only_recent_artists;
        Affinity::new(score)
    }

    fn name(&self) -> &'static str {
        "facet_cardinality"
    }
}
