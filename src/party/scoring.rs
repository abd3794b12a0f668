use crate::models::{Track, TrackScore};
use std::collections::{HashMap, HashSet};

/// Scoring and calculation functionality
pub struct TrackScoring;

impl TrackScoring {
    /// Number of distinct guests holding each track id in this population
    pub fn distinct_owner_counts(tracks: &[Track]) -> HashMap<&str, usize> {
        let mut owners: HashMap<&str, HashSet<&str>> = HashMap::new();
        for track in tracks {
            owners
                .entry(track.id.as_str())
                .or_default()
                .insert(track.owner.as_str());
        }

        owners
            .into_iter()
            .map(|(id, owners)| (id, owners.len()))
            .collect()
    }

    /// Attach a score to every track, computed over this exact population
    ///
    /// The duplicate count depends on which tracks are in scope, so callers
    /// must rescore after every filter pass instead of reusing old scores.
    pub fn score_tracks(tracks: Vec<Track>) -> Vec<Track> {
        let counts: HashMap<String, usize> = Self::distinct_owner_counts(&tracks)
            .into_iter()
            .map(|(id, count)| (id.to_string(), count))
            .collect();

        tracks
            .into_iter()
            .map(|mut track| {
                track.score = Some(TrackScore {
                    cross_user_dup_count: counts.get(&track.id).copied().unwrap_or(0),
                    popularity: track.popularity,
                    release_year: track.release_year().unwrap_or(0),
                });
                track
            })
            .collect()
    }

    /// Stable descending sort by `(cross_user_dup_count, popularity, release_year)`
    pub fn sort_by_rank(tracks: &mut [Track]) {
        tracks.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()));
    }
}
