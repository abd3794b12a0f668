use super::scoring::TrackScoring;
use crate::models::Track;
use std::collections::HashSet;

pub const DEFAULT_CONSENSUS_LIMIT: usize = 10;

/// Shared tracks that missed the cut, and replacements for removed tracks
pub struct ConsensusSurfacer;

impl ConsensusSurfacer {
    /// Top tracks held by at least two guests that are not already selected
    ///
    /// Owner counts are taken over `tracks` itself, so pass the filtered
    /// population rather than everything that was gathered.
    pub fn top_consensus(
        tracks: &[Track],
        excluded_ids: &HashSet<String>,
        limit: usize,
    ) -> Vec<Track> {
        let owner_counts = TrackScoring::distinct_owner_counts(tracks);
        let mut seen: HashSet<&str> = HashSet::new();

        let mut shared: Vec<(usize, &Track)> = tracks
            .iter()
            .filter(|track| !excluded_ids.contains(&track.id))
            .filter_map(|track| {
                let count = owner_counts.get(track.id.as_str()).copied().unwrap_or(0);
                // First copy of each id wins for display fields
                (count >= 2 && seen.insert(track.id.as_str())).then_some((count, track))
            })
            .collect();

        shared.sort_by(|(count_a, a), (count_b, b)| {
            (count_b, b.popularity).cmp(&(count_a, a.popularity))
        });

        shared
            .into_iter()
            .take(limit)
            .map(|(_, track)| track.clone())
            .collect()
    }

    /// Filtered tracks still eligible as replacements
    ///
    /// Tracks owned by `excluded_guests` (zero-weight Focus guests) never qualify.
    pub fn remaining_pool(
        filtered: &[Track],
        selection: &[Track],
        removed_ids: &HashSet<String>,
        excluded_guests: &HashSet<String>,
    ) -> Vec<Track> {
        let selected: HashSet<&str> = selection.iter().map(|t| t.id.as_str()).collect();
        filtered
            .iter()
            .filter(|t| !selected.contains(t.id.as_str()) && !removed_ids.contains(&t.id))
            .filter(|t| !excluded_guests.contains(&t.owner))
            .cloned()
            .collect()
    }

    /// Best `removed_count` distinct tracks from the pool by score key
    pub fn refill(remaining_pool: &[Track], removed_count: usize) -> Vec<Track> {
        let mut ranked: Vec<&Track> = remaining_pool.iter().collect();
        ranked.sort_by(|a, b| b.rank_key().cmp(&a.rank_key()));

        let mut seen: HashSet<&str> = HashSet::new();
        ranked
            .into_iter()
            .filter(|t| seen.insert(t.id.as_str()))
            .take(removed_count)
            .cloned()
            .collect()
    }

    /// Selection without the removed ids, followed by the replacements
    pub fn apply_removals(
        selection: &[Track],
        removed_ids: &HashSet<String>,
        refill: Vec<Track>,
    ) -> Vec<Track> {
        selection
            .iter()
            .filter(|t| !removed_ids.contains(&t.id))
            .cloned()
            .chain(refill)
            .collect()
    }

    /// Drop `removed_ids` from the selection and top it back up from `filtered`
    pub fn replace_removed(
        filtered: &[Track],
        selection: &[Track],
        removed_ids: &HashSet<String>,
        excluded_guests: &HashSet<String>,
    ) -> Vec<Track> {
        let removed_count = selection
            .iter()
            .filter(|t| removed_ids.contains(&t.id))
            .count();
        if removed_count == 0 {
            return selection.to_vec();
        }

        let pool = Self::remaining_pool(filtered, selection, removed_ids, excluded_guests);
        let replacements = Self::refill(&pool, removed_count);
        Self::apply_removals(selection, removed_ids, replacements)
    }
}
