//! Consensus and discovery genre suggestions from the guests' listening history
//!
//! Consensus genres are shared widely across guests; discovery genres belong
//! to one guest (or a small minority) and introduce guests to each other's
//! niche tastes. The logic branches on guest count because "shared" means
//! different things for one, two, or many guests.
//!
//! All rankings break ties by genre name so equal input gives equal output.

use crate::models::Track;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const MAX_RECOMMENDATIONS: usize = 5;
const DISCOVERY_PER_GUEST: usize = 2;

pub const SINGLE_GUEST_MESSAGE: &str = "Discovery genres require at least 2 guests.";
pub const SIMILAR_TASTES_MESSAGE: &str = "No discovery genres found - music tastes are similar.";

/// A genre well represented across guests
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusGenre {
    pub genre: String,
    pub users_sharing: usize,
    pub shared_count: usize, // Own count (1 guest), overlap (2 guests), summed count (3+)
    pub avg_proportion: f64, // Mean share of each holder's library carrying this genre
    pub score: f64,
}

/// A genre unique to one guest or a small minority
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryGenre {
    pub genre: String,
    pub guests: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct GenreRecommendations {
    pub consensus: Vec<ConsensusGenre>,
    pub discovery: Vec<DiscoveryGenre>,
    pub discovery_message: Option<String>,
}

/// Per-guest genre counts
#[derive(Debug, Default)]
struct GenreHistogram<'a> {
    counts: BTreeMap<&'a str, usize>,
    total_tracks: usize,
}

impl GenreHistogram<'_> {
    fn count(&self, genre: &str) -> usize {
        self.counts.get(genre).copied().unwrap_or(0)
    }

    fn proportion(&self, genre: &str) -> f64 {
        if self.total_tracks == 0 {
            0.0
        } else {
            self.count(genre) as f64 / self.total_tracks as f64
        }
    }
}

pub struct GenreRecommender;

impl GenreRecommender {
    /// Recommend genres for an ordered, deduplicated guest list
    pub fn recommend(tracks: &[Track], guests: &[String]) -> GenreRecommendations {
        let histograms = build_histograms(tracks);
        let empty = GenreHistogram::default();
        let guest_histograms: Vec<(&str, &GenreHistogram)> = guests
            .iter()
            .map(|guest| (guest.as_str(), histograms.get(guest.as_str()).unwrap_or(&empty)))
            .collect();

        match guest_histograms.as_slice() {
            [] => GenreRecommendations::default(),
            [single] => recommend_single(*single),
            [first, second] => recommend_pair(*first, *second),
            many => recommend_group(many),
        }
    }
}

fn build_histograms(tracks: &[Track]) -> HashMap<&str, GenreHistogram<'_>> {
    let mut histograms: HashMap<&str, GenreHistogram> = HashMap::new();
    for track in tracks {
        let histogram = histograms.entry(track.owner.as_str()).or_default();
        histogram.total_tracks += 1;
        for genre in &track.genres {
            *histogram.counts.entry(genre.as_str()).or_insert(0) += 1;
        }
    }
    histograms
}

fn recommend_single((guest, histogram): (&str, &GenreHistogram)) -> GenreRecommendations {
    if histogram.counts.is_empty() {
        return GenreRecommendations {
            discovery_message: Some(format!("No genres found in {guest}'s playlists.")),
            ..GenreRecommendations::default()
        };
    }

    let mut ranked: Vec<(&str, usize)> = histogram
        .counts
        .iter()
        .map(|(genre, count)| (*genre, *count))
        .collect();
    // BTreeMap order is alphabetical, so the stable sort keeps name order on ties
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let consensus = ranked
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|(genre, count)| ConsensusGenre {
            genre: genre.to_string(),
            users_sharing: 1,
            shared_count: count,
            avg_proportion: histogram.proportion(genre),
            score: count as f64,
        })
        .collect();

    GenreRecommendations {
        consensus,
        discovery: Vec::new(),
        discovery_message: Some(SINGLE_GUEST_MESSAGE.to_string()),
    }
}

fn recommend_pair(
    (first, first_histogram): (&str, &GenreHistogram),
    (second, second_histogram): (&str, &GenreHistogram),
) -> GenreRecommendations {
    let all_genres: BTreeSet<&str> = first_histogram
        .counts
        .keys()
        .chain(second_histogram.counts.keys())
        .copied()
        .collect();

    let mut consensus: Vec<ConsensusGenre> = all_genres
        .iter()
        .filter_map(|genre| {
            let intersection = first_histogram.count(genre).min(second_histogram.count(genre));
            (intersection > 0).then(|| ConsensusGenre {
                genre: genre.to_string(),
                users_sharing: 2,
                shared_count: intersection,
                avg_proportion: (first_histogram.proportion(genre)
                    + second_histogram.proportion(genre))
                    / 2.0,
                score: intersection as f64,
            })
        })
        .collect();
    consensus.sort_by(|a, b| b.shared_count.cmp(&a.shared_count));
    consensus.truncate(MAX_RECOMMENDATIONS);

    let candidates: Vec<DiscoveryGenre> = all_genres
        .iter()
        .filter(|genre| !consensus.iter().any(|c| c.genre == **genre))
        .filter_map(|genre| {
            let (guest, count) =
                match (first_histogram.count(genre), second_histogram.count(genre)) {
                    (count, 0) if count > 0 => (first, count),
                    (0, count) if count > 0 => (second, count),
                    _ => return None,
                };
            Some(DiscoveryGenre {
                genre: genre.to_string(),
                guests: vec![guest.to_string()],
                count,
            })
        })
        .collect();

    with_discovery(consensus, candidates)
}

fn recommend_group(guests: &[(&str, &GenreHistogram)]) -> GenreRecommendations {
    let n = guests.len();
    let min_users_required = n.div_ceil(2);
    let max_users_for_discovery = if n <= 3 { 1 } else { n / 2 };

    let all_genres: BTreeSet<&str> = guests
        .iter()
        .flat_map(|(_, histogram)| histogram.counts.keys().copied())
        .collect();

    let holders_of = |genre: &str| {
        guests
            .iter()
            .filter(|(_, histogram)| histogram.count(genre) > 0)
            .copied()
            .collect::<Vec<_>>()
    };

    let mut consensus: Vec<ConsensusGenre> = all_genres
        .iter()
        .filter_map(|genre| {
            let holders = holders_of(*genre);
            if holders.len() < min_users_required {
                return None;
            }

            let breadth = holders.len() as f64 / n as f64;
            let avg_proportion = holders
                .iter()
                .map(|(_, histogram)| histogram.proportion(genre))
                .sum::<f64>()
                / holders.len() as f64;

            Some(ConsensusGenre {
                genre: genre.to_string(),
                users_sharing: holders.len(),
                shared_count: holders.iter().map(|(_, h)| h.count(genre)).sum(),
                avg_proportion,
                score: 0.9 * breadth + 0.1 * avg_proportion,
            })
        })
        .collect();
    consensus.sort_by(|a, b| b.score.total_cmp(&a.score));
    consensus.truncate(MAX_RECOMMENDATIONS);

    let candidates: Vec<DiscoveryGenre> = all_genres
        .iter()
        .filter(|genre| !consensus.iter().any(|c| c.genre == **genre))
        .filter_map(|genre| {
            let holders = holders_of(*genre);
            if holders.is_empty() || holders.len() > max_users_for_discovery {
                return None;
            }
            Some(DiscoveryGenre {
                genre: genre.to_string(),
                guests: holders.iter().map(|(guest, _)| guest.to_string()).collect(),
                count: holders.iter().map(|(_, h)| h.count(genre)).sum(),
            })
        })
        .collect();

    with_discovery(consensus, candidates)
}

/// Rank discovery candidates and fill the list, spreading picks across guests
///
/// First pass admits a genre only if one of its holders has fewer than two
/// picks so far; the second pass backfills in rank order ignoring that cap.
fn with_discovery(
    consensus: Vec<ConsensusGenre>,
    mut candidates: Vec<DiscoveryGenre>,
) -> GenreRecommendations {
    // Candidates arrive in genre-name order; the stable sort keeps it on ties
    candidates.sort_by(|a, b| b.count.cmp(&a.count));

    let mut picks_per_guest: HashMap<&str, usize> = HashMap::new();
    let mut picked = vec![false; candidates.len()];
    let mut discovery_order = Vec::new();

    for (i, candidate) in candidates.iter().enumerate() {
        if discovery_order.len() >= MAX_RECOMMENDATIONS {
            break;
        }
        let has_room = candidate.guests.iter().any(|guest| {
            picks_per_guest.get(guest.as_str()).copied().unwrap_or(0) < DISCOVERY_PER_GUEST
        });
        if has_room {
            picked[i] = true;
            discovery_order.push(i);
            for guest in &candidate.guests {
                *picks_per_guest.entry(guest.as_str()).or_insert(0) += 1;
            }
        }
    }

    for i in 0..candidates.len() {
        if discovery_order.len() >= MAX_RECOMMENDATIONS {
            break;
        }
        if !picked[i] {
            discovery_order.push(i);
        }
    }

    let discovery: Vec<DiscoveryGenre> = discovery_order
        .into_iter()
        .map(|i| candidates[i].clone())
        .collect();
    let discovery_message = discovery
        .is_empty()
        .then(|| SIMILAR_TASTES_MESSAGE.to_string());

    GenreRecommendations {
        consensus,
        discovery,
        discovery_message,
    }
}
