use crate::models::Track;
use std::collections::{HashMap, HashSet};

/// Metadata about the final playlist composition
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSummary {
    pub total_tracks: usize,
    pub artist_count: usize, // Distinct artist sets, collaborations counted once
    pub era_span: (Option<i32>, Option<i32>), // (min_year, max_year)
    pub avg_popularity: f32,
    pub explicit_count: usize,
    pub genre_distribution: HashMap<String, usize>,
}

impl PlaylistSummary {
    pub fn calculate(tracks: &[Track]) -> PlaylistSummary {
        if tracks.is_empty() {
            return PlaylistSummary {
                total_tracks: 0,
                artist_count: 0,
                era_span: (None, None),
                avg_popularity: 0.0,
                explicit_count: 0,
                genre_distribution: HashMap::new(),
            };
        }

        let mut genre_distribution = HashMap::new();
        for track in tracks {
            for genre in &track.genres {
                *genre_distribution.entry(genre.clone()).or_insert(0) += 1;
            }
        }

        let artist_count = tracks
            .iter()
            .map(|t| t.artist_key())
            .collect::<HashSet<_>>()
            .len();

        let years: Vec<i32> = tracks.iter().filter_map(|t| t.release_year()).collect();
        let era_span = (years.iter().min().copied(), years.iter().max().copied());

        let avg_popularity = tracks.iter().map(|t| t.popularity as f32).sum::<f32>()
            / tracks.len() as f32;

        PlaylistSummary {
            total_tracks: tracks.len(),
            artist_count,
            era_span,
            avg_popularity,
            explicit_count: tracks.iter().filter(|t| t.explicit).count(),
            genre_distribution,
        }
    }

    /// Genres by descending count, then name
    pub fn top_genres(&self, limit: usize) -> Vec<(&str, usize)> {
        let mut genres: Vec<(&str, usize)> = self
            .genre_distribution
            .iter()
            .map(|(genre, count)| (genre.as_str(), *count))
            .collect();
        genres.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        genres.truncate(limit);
        genres
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn track(artist_ids: &[&str], popularity: u8, year: Option<&str>, genres: &[&str]) -> Track {
        Track {
            artist_ids: artist_ids.iter().map(|a| a.to_string()).collect(),
            popularity,
            release_date: year.map(|y| y.to_string()),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            ..Track::default()
        }
    }

    #[test]
    fn test_empty_playlist() {
        let summary = PlaylistSummary::calculate(&[]);
        assert_eq!(summary.total_tracks, 0);
        assert_eq!(summary.era_span, (None, None));
    }

    #[test]
    fn test_summary_statistics() {
        let mut explicit = track(&["a"], 90, Some("1999-12-31"), &["rock"]);
        explicit.explicit = true;
        let tracks = vec![
            explicit,
            track(&["a"], 30, Some("1975"), &["rock", "blues"]),
            track(&["b", "a"], 60, None, &["blues"]),
            track(&["a", "b"], 20, Some("2012-05"), &[]),
        ];

        let summary = PlaylistSummary::calculate(&tracks);
        assert_eq!(summary.total_tracks, 4);
        assert_eq!(summary.artist_count, 2);
        assert_eq!(summary.era_span, (Some(1975), Some(2012)));
        assert_relative_eq!(summary.avg_popularity, 50.0);
        assert_eq!(summary.explicit_count, 1);
        assert_eq!(summary.top_genres(5), vec![("blues", 2), ("rock", 2)]);
        assert_eq!(summary.top_genres(1), vec![("blues", 2)]);
    }
}
