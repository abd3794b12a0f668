use crate::models::Track;
use std::collections::HashMap;

/// User-chosen constraints applied before scoring and allocation
#[derive(Debug, Clone)]
pub struct FilterCriteria {
    pub selected_genres: Vec<String>, // Empty = keep all
    pub year_range: Option<(i32, i32)>,
    pub popularity_range: (u8, u8),
    pub market: Option<String>,
    pub market_filter_enabled: bool,
    pub max_per_artist: Option<usize>, // None or 0 = no cap
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            selected_genres: Vec::new(),
            year_range: None,
            popularity_range: (0, 100),
            market: None,
            market_filter_enabled: false,
            max_per_artist: None,
        }
    }
}

/// Track filtering functionality using static helper functions
pub struct TrackFilters;

impl TrackFilters {
    /// Check if a track carries at least one selected genre
    pub fn matches_selected_genres(track: &Track, criteria: &FilterCriteria) -> bool {
        criteria.selected_genres.is_empty() || track.has_any_genre(&criteria.selected_genres)
    }

    /// Check if a track was released inside the year range
    pub fn matches_year_range(track: &Track, criteria: &FilterCriteria) -> bool {
        let Some((lo, hi)) = criteria.year_range else {
            return true;
        };

        // Tracks without a parsable year are dropped while a range is active
        match track.release_year() {
            Some(year) => lo <= year && year <= hi,
            None => false,
        }
    }

    pub fn matches_popularity_range(track: &Track, criteria: &FilterCriteria) -> bool {
        let (lo, hi) = criteria.popularity_range;
        lo <= track.popularity && track.popularity <= hi
    }

    /// Check if a track is playable in the requested market
    pub fn matches_market(track: &Track, criteria: &FilterCriteria) -> bool {
        if !criteria.market_filter_enabled {
            return true;
        }

        match &criteria.market {
            Some(market) => track.available_markets.iter().any(|m| m == market),
            None => true,
        }
    }

    /// Apply every predicate, then the per-artist cap in input order
    pub fn filter_tracks(tracks: &[Track], criteria: &FilterCriteria) -> Vec<Track> {
        let cap = criteria.max_per_artist.filter(|&cap| cap > 0);
        let mut artist_count: HashMap<Vec<String>, usize> = HashMap::new();
        let mut filtered = Vec::new();

        for track in tracks {
            if !Self::matches_selected_genres(track, criteria)
                || !Self::matches_year_range(track, criteria)
                || !Self::matches_popularity_range(track, criteria)
                || !Self::matches_market(track, criteria)
            {
                continue;
            }

            // Collaborations count against their exact artist set, not each artist
            let count = artist_count.entry(track.artist_key()).or_insert(0);
            if cap.is_some_and(|cap| *count >= cap) {
                continue;
            }

            *count += 1;
            filtered.push(track.clone());
        }

        filtered
    }
}
